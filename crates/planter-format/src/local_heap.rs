//! Local heap (`HEAP`), the name store of old-style groups.

use crate::bytes::{ensure_len, read_uint};
use crate::error::FormatError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalHeap {
    pub data_segment_size: u64,
    pub data_segment_address: u64,
}

impl LocalHeap {
    pub fn parse(
        file_data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<LocalHeap, FormatError> {
        // signature, version, reserved(3), segment size, free list head, segment address
        let ls = length_size as usize;
        ensure_len(file_data, offset, 8 + 2 * ls + offset_size as usize)?;
        if &file_data[offset..offset + 4] != b"HEAP" {
            return Err(FormatError::InvalidLocalHeapSignature);
        }
        let version = file_data[offset + 4];
        if version != 0 {
            return Err(FormatError::InvalidLocalHeapVersion(version));
        }
        let data_segment_size = read_uint(file_data, offset + 8, length_size)?;
        let data_segment_address = read_uint(file_data, offset + 8 + 2 * ls, offset_size)?;
        Ok(LocalHeap {
            data_segment_size,
            data_segment_address,
        })
    }

    /// NUL-terminated string at `string_offset` within the data segment.
    pub fn read_string(&self, file_data: &[u8], string_offset: u64) -> Result<String, FormatError> {
        let start = (self.data_segment_address + string_offset) as usize;
        let seg_end = (self.data_segment_address + self.data_segment_size) as usize;
        let end_limit = seg_end.min(file_data.len());
        if start >= end_limit {
            return Err(FormatError::UnexpectedEof {
                expected: start + 1,
                available: end_limit,
            });
        }
        let bytes = &file_data[start..end_limit];
        let len = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..len]).into_owned())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn build_heap(at: u64, names: &[&str]) -> (Vec<u8>, Vec<u64>) {
        let mut segment = vec![0u8; 8];
        let mut offsets = Vec::new();
        for name in names {
            offsets.push(segment.len() as u64);
            segment.extend_from_slice(name.as_bytes());
            segment.push(0);
        }
        segment.resize(crate::bytes::pad8(segment.len()), 0);
        let mut buf = b"HEAP".to_vec();
        buf.extend_from_slice(&[0, 0, 0, 0]);
        buf.extend_from_slice(&(segment.len() as u64).to_le_bytes());
        buf.extend_from_slice(&u64::MAX.to_le_bytes());
        buf.extend_from_slice(&(at + 32).to_le_bytes());
        buf.extend_from_slice(&segment);
        (buf, offsets)
    }

    #[test]
    fn read_names() {
        let (heap_bytes, offsets) = build_heap(0, &["Data", "Marks"]);
        let heap = LocalHeap::parse(&heap_bytes, 0, 8, 8).unwrap();
        assert_eq!(heap.data_segment_address, 32);
        assert_eq!(heap.read_string(&heap_bytes, offsets[1]).unwrap(), "Marks");
        assert_eq!(heap.read_string(&heap_bytes, 0).unwrap(), "");
    }

    #[test]
    fn offset_past_segment() {
        let (heap_bytes, _) = build_heap(0, &["a"]);
        let heap = LocalHeap::parse(&heap_bytes, 0, 8, 8).unwrap();
        assert!(heap.read_string(&heap_bytes, 1000).is_err());
    }

    #[test]
    fn bad_signature() {
        let (mut heap_bytes, _) = build_heap(0, &["a"]);
        heap_bytes[0] = b'X';
        assert_eq!(
            LocalHeap::parse(&heap_bytes, 0, 8, 8).unwrap_err(),
            FormatError::InvalidLocalHeapSignature
        );
    }
}
