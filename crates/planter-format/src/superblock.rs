//! HDF5 superblock parsing (versions 0–3) and version 2 serialization.

use byteorder::{ByteOrder, LittleEndian};

use crate::bytes::{ensure_len, read_uint, write_uint, UNDEF_ADDR};
use crate::checksum::{jenkins_lookup3, verify};
use crate::error::FormatError;
use crate::signature::HDF5_SIGNATURE;

/// Size in bytes of a serialized version 2 superblock with 8-byte offsets.
pub const SUPERBLOCK_V2_SIZE: usize = 48;

/// Parsed HDF5 superblock (all versions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Superblock {
    /// Superblock version (0–3).
    pub version: u8,
    /// Size of offsets in bytes (2, 4, or 8).
    pub offset_size: u8,
    /// Size of lengths in bytes (2, 4, or 8).
    pub length_size: u8,
    /// File base address.
    pub base_address: u64,
    /// End-of-file address.
    pub eof_address: u64,
    /// Root group object header address.
    pub root_group_address: u64,
    /// Group leaf node K (v0/v1 only).
    pub group_leaf_node_k: Option<u16>,
    /// Group internal node K (v0/v1 only).
    pub group_internal_node_k: Option<u16>,
    /// Indexed storage internal node K (v1 only).
    pub indexed_storage_internal_node_k: Option<u16>,
    /// File consistency flags.
    pub consistency_flags: u32,
    /// Superblock extension address (v2/v3 only).
    pub superblock_extension_address: Option<u64>,
}

fn validate_sizes(offset_size: u8, length_size: u8) -> Result<(), FormatError> {
    if !matches!(offset_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidOffsetSize(offset_size));
    }
    if !matches!(length_size, 2 | 4 | 8) {
        return Err(FormatError::InvalidLengthSize(length_size));
    }
    Ok(())
}

impl Superblock {
    /// Parse a superblock from `data` starting at `signature_offset`.
    pub fn parse(data: &[u8], signature_offset: usize) -> Result<Superblock, FormatError> {
        ensure_len(data, signature_offset, 9)?;
        let d = &data[signature_offset..];
        if d[..8] != HDF5_SIGNATURE {
            return Err(FormatError::SignatureNotFound);
        }

        match d[8] {
            0 | 1 => Self::parse_v0v1(d, d[8]),
            2 | 3 => Self::parse_v2v3(d, d[8]),
            v => Err(FormatError::UnsupportedVersion(v)),
        }
    }

    fn parse_v0v1(d: &[u8], version: u8) -> Result<Superblock, FormatError> {
        // sig(8) version free_space_ver root_grp_ver reserved shared_hdr_ver
        // offset_size length_size reserved group_leaf_k(2) group_internal_k(2)
        // [v1: indexed_storage_k(2) reserved(2)] consistency_flags(4)
        let fixed = if version == 0 { 24 } else { 28 };
        ensure_len(d, 0, fixed)?;

        let offset_size = d[13];
        let length_size = d[14];
        validate_sizes(offset_size, length_size)?;

        let group_leaf_node_k = LittleEndian::read_u16(&d[16..18]);
        let group_internal_node_k = LittleEndian::read_u16(&d[18..20]);
        let indexed_storage_internal_node_k = if version == 1 {
            Some(LittleEndian::read_u16(&d[20..22]))
        } else {
            None
        };
        let consistency_flags = LittleEndian::read_u32(&d[fixed - 4..fixed]);

        let os = offset_size as usize;
        // base, free-space, eof, driver info, then the root symbol table entry
        // (link name offset, object header address, cache type, reserved, scratch)
        ensure_len(d, fixed, 4 * os + 2 * os + 24)?;
        let base_address = read_uint(d, fixed, offset_size)?;
        let eof_address = read_uint(d, fixed + 2 * os, offset_size)?;
        let root_group_address = read_uint(d, fixed + 5 * os, offset_size)?;

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_group_address,
            group_leaf_node_k: Some(group_leaf_node_k),
            group_internal_node_k: Some(group_internal_node_k),
            indexed_storage_internal_node_k,
            consistency_flags,
            superblock_extension_address: None,
        })
    }

    fn parse_v2v3(d: &[u8], version: u8) -> Result<Superblock, FormatError> {
        ensure_len(d, 0, 12)?;
        let offset_size = d[9];
        let length_size = d[10];
        validate_sizes(offset_size, length_size)?;
        let consistency_flags = d[11] as u32;

        let os = offset_size as usize;
        let checksum_pos = 12 + 4 * os;
        ensure_len(d, checksum_pos, 4)?;
        verify(d, 0, checksum_pos)?;

        let base_address = read_uint(d, 12, offset_size)?;
        let extension = read_uint(d, 12 + os, offset_size)?;
        let eof_address = read_uint(d, 12 + 2 * os, offset_size)?;
        let root_group_address = read_uint(d, 12 + 3 * os, offset_size)?;

        Ok(Superblock {
            version,
            offset_size,
            length_size,
            base_address,
            eof_address,
            root_group_address,
            group_leaf_node_k: None,
            group_internal_node_k: None,
            indexed_storage_internal_node_k: None,
            consistency_flags,
            superblock_extension_address: Some(extension),
        })
    }

    /// A version 2 superblock for a file whose root group header is at
    /// `root_group_address` and whose last byte is at `eof_address - 1`.
    pub fn v2(root_group_address: u64, eof_address: u64) -> Superblock {
        Superblock {
            version: 2,
            offset_size: 8,
            length_size: 8,
            base_address: 0,
            eof_address,
            root_group_address,
            group_leaf_node_k: None,
            group_internal_node_k: None,
            indexed_storage_internal_node_k: None,
            consistency_flags: 0,
            superblock_extension_address: Some(UNDEF_ADDR),
        }
    }

    /// Serialize as a version 2 superblock (the layout is shared with v3).
    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(12 + 4 * self.offset_size as usize + 4);
        buf.extend_from_slice(&HDF5_SIGNATURE);
        buf.push(if self.version >= 3 { 3 } else { 2 });
        buf.push(self.offset_size);
        buf.push(self.length_size);
        buf.push(self.consistency_flags as u8);
        write_uint(&mut buf, self.base_address, self.offset_size);
        write_uint(
            &mut buf,
            self.superblock_extension_address.unwrap_or(UNDEF_ADDR),
            self.offset_size,
        );
        write_uint(&mut buf, self.eof_address, self.offset_size);
        write_uint(&mut buf, self.root_group_address, self.offset_size);
        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }
}
