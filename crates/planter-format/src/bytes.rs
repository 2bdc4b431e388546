//! Little-endian field helpers shared by the parsers and writers.

use byteorder::{ByteOrder, LittleEndian};

use crate::error::FormatError;

/// The "undefined address" value (all bits set).
pub const UNDEF_ADDR: u64 = u64::MAX;

pub(crate) fn ensure_len(data: &[u8], offset: usize, needed: usize) -> Result<(), FormatError> {
    match offset.checked_add(needed) {
        Some(end) if end <= data.len() => Ok(()),
        _ => Err(FormatError::UnexpectedEof {
            expected: offset.saturating_add(needed),
            available: data.len(),
        }),
    }
}

/// Read an unsigned integer of 1, 2, 4 or 8 bytes at `pos`.
pub(crate) fn read_uint(data: &[u8], pos: usize, size: u8) -> Result<u64, FormatError> {
    ensure_len(data, pos, size as usize)?;
    let slice = &data[pos..pos + size as usize];
    Ok(match size {
        1 => slice[0] as u64,
        2 => LittleEndian::read_u16(slice) as u64,
        4 => LittleEndian::read_u32(slice) as u64,
        8 => LittleEndian::read_u64(slice),
        _ => return Err(FormatError::InvalidOffsetSize(size)),
    })
}

pub(crate) fn read_u16(data: &[u8], pos: usize) -> Result<u16, FormatError> {
    ensure_len(data, pos, 2)?;
    Ok(LittleEndian::read_u16(&data[pos..pos + 2]))
}

pub(crate) fn read_u32(data: &[u8], pos: usize) -> Result<u32, FormatError> {
    ensure_len(data, pos, 4)?;
    Ok(LittleEndian::read_u32(&data[pos..pos + 4]))
}

/// Read an address field, mapping the all-ones pattern to `None`.
pub(crate) fn read_addr(data: &[u8], pos: usize, size: u8) -> Result<Option<u64>, FormatError> {
    ensure_len(data, pos, size as usize)?;
    if data[pos..pos + size as usize].iter().all(|&b| b == 0xFF) {
        Ok(None)
    } else {
        read_uint(data, pos, size).map(Some)
    }
}

/// Append `val` as a `size`-byte little-endian integer.
pub(crate) fn write_uint(buf: &mut Vec<u8>, val: u64, size: u8) {
    match size {
        1 => buf.push(val as u8),
        2 => buf.extend_from_slice(&(val as u16).to_le_bytes()),
        4 => buf.extend_from_slice(&(val as u32).to_le_bytes()),
        _ => buf.extend_from_slice(&val.to_le_bytes()),
    }
}

/// Read a NUL-terminated name starting at `offset`.
/// Returns the name and the bytes consumed including the terminator.
pub(crate) fn read_cstr(data: &[u8], offset: usize) -> Result<(String, usize), FormatError> {
    ensure_len(data, offset, 1)?;
    let remaining = &data[offset..];
    let nul = remaining
        .iter()
        .position(|&b| b == 0)
        .ok_or(FormatError::UnexpectedEof {
            expected: data.len() + 1,
            available: data.len(),
        })?;
    let name = String::from_utf8_lossy(&remaining[..nul]).into_owned();
    Ok((name, nul + 1))
}

/// Round up to the next multiple of 8.
pub(crate) fn pad8(x: usize) -> usize {
    (x + 7) & !7
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_each_width() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_uint(&data, 0, 1).unwrap(), 0x01);
        assert_eq!(read_uint(&data, 0, 2).unwrap(), 0x0201);
        assert_eq!(read_uint(&data, 0, 4).unwrap(), 0x0403_0201);
        assert_eq!(read_uint(&data, 0, 8).unwrap(), 0x0807_0605_0403_0201);
    }

    #[test]
    fn rejects_bad_width() {
        assert_eq!(read_uint(&[0; 8], 0, 3), Err(FormatError::InvalidOffsetSize(3)));
    }

    #[test]
    fn truncated_read_reports_eof() {
        let err = read_uint(&[0; 3], 0, 4).unwrap_err();
        assert_eq!(err, FormatError::UnexpectedEof { expected: 4, available: 3 });
    }

    #[test]
    fn undefined_address() {
        assert_eq!(read_addr(&[0xFF; 8], 0, 8).unwrap(), None);
        assert_eq!(read_addr(&[0x30, 0, 0, 0, 0, 0, 0, 0], 0, 8).unwrap(), Some(0x30));
    }

    #[test]
    fn cstr_and_padding() {
        let (name, used) = read_cstr(b"Data\0xyz", 0).unwrap();
        assert_eq!(name, "Data");
        assert_eq!(used, 5);
        assert_eq!(pad8(5), 8);
        assert_eq!(pad8(16), 16);
    }

    #[test]
    fn write_then_read_address() {
        let mut buf = Vec::new();
        write_uint(&mut buf, 0x1234, 8);
        write_uint(&mut buf, 7, 2);
        assert_eq!(buf.len(), 10);
        assert_eq!(read_uint(&buf, 0, 8).unwrap(), 0x1234);
        assert_eq!(read_u16(&buf, 8).unwrap(), 7);
    }
}
