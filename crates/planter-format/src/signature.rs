//! Locating the format signature that precedes the superblock.

use crate::error::FormatError;

/// `\x89HDF\r\n\x1a\n`.
pub const HDF5_SIGNATURE: [u8; 8] = [0x89, b'H', b'D', b'F', b'\r', b'\n', 0x1A, b'\n'];

/// Offsets where a superblock may start: 0, then 512 doubled, since a
/// user block is always a power of two of at least 512 bytes.
fn candidate_offsets(len: usize) -> impl Iterator<Item = usize> {
    std::iter::once(0)
        .chain(std::iter::successors(Some(512usize), |o| o.checked_mul(2)))
        .take_while(move |&o| o.saturating_add(HDF5_SIGNATURE.len()) <= len)
}

/// Byte offset of the signature in `data`.
pub fn find_signature(data: &[u8]) -> Result<usize, FormatError> {
    candidate_offsets(data.len())
        .find(|&o| data[o..o + HDF5_SIGNATURE.len()] == HDF5_SIGNATURE)
        .ok_or(FormatError::SignatureNotFound)
}
