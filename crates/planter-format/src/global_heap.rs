//! Global heap collections (`GCOL`) and the variable-length strings stored
//! in them.
//!
//! An element of a variable-length type does not hold its value. It holds
//! a heap ID: `length(4) + collection address(offset_size) + index(4)`.
//! h5py stores every Python `str` attribute this way.

use crate::bytes::{ensure_len, pad8, read_u16, read_u32, read_uint};
use crate::error::FormatError;

const GCOL_SIGNATURE: [u8; 4] = *b"GCOL";

/// One object of a collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalHeapObject {
    /// 1-based; index 0 marks the free space.
    pub index: u16,
    pub reference_count: u16,
    pub data: Vec<u8>,
}

/// A parsed global heap collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalHeapCollection {
    /// Size of the collection including its header.
    pub collection_size: u64,
    pub objects: Vec<GlobalHeapObject>,
}

impl GlobalHeapCollection {
    pub fn parse(data: &[u8], offset: usize, length_size: u8) -> Result<Self, FormatError> {
        let header_size = 8 + length_size as usize;
        ensure_len(data, offset, header_size)?;
        if data[offset..offset + 4] != GCOL_SIGNATURE {
            return Err(FormatError::InvalidGlobalHeapSignature);
        }
        let version = data[offset + 4];
        if version != 1 {
            return Err(FormatError::InvalidGlobalHeapVersion(version));
        }
        let collection_size = read_uint(data, offset + 8, length_size)?;
        let end = offset.saturating_add(collection_size as usize).min(data.len());

        let object_header = 8 + length_size as usize;
        let mut pos = offset + header_size;
        let mut objects = Vec::new();
        while pos + object_header <= end {
            let index = read_u16(data, pos)?;
            if index == 0 {
                break;
            }
            let reference_count = read_u16(data, pos + 2)?;
            let size = read_uint(data, pos + 8, length_size)? as usize;
            pos += object_header;
            ensure_len(data, pos, size)?;
            objects.push(GlobalHeapObject {
                index,
                reference_count,
                data: data[pos..pos + size].to_vec(),
            });
            pos += pad8(size);
        }
        Ok(GlobalHeapCollection {
            collection_size,
            objects,
        })
    }

    pub fn object(&self, index: u16) -> Option<&GlobalHeapObject> {
        self.objects.iter().find(|o| o.index == index)
    }
}

/// A heap ID read from a variable-length element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapId {
    pub length: u32,
    /// `None` for a null reference.
    pub collection_address: Option<u64>,
    pub index: u32,
}

/// Split `raw` into `count` heap IDs.
pub fn parse_heap_ids(raw: &[u8], count: u64, offset_size: u8) -> Result<Vec<HeapId>, FormatError> {
    let stride = 8 + offset_size as usize;
    ensure_len(raw, 0, count as usize * stride)?;
    (0..count as usize)
        .map(|i| {
            let pos = i * stride;
            let address = read_uint(raw, pos + 4, offset_size)?;
            let null = address == 0 || raw[pos + 4..pos + 4 + offset_size as usize].iter().all(|&b| b == 0xFF);
            Ok(HeapId {
                length: read_u32(raw, pos)?,
                collection_address: (!null).then_some(address),
                index: read_u32(raw, pos + 4 + offset_size as usize)?,
            })
        })
        .collect()
}

/// Resolve `count` variable-length strings. `file` is the file image the
/// heap addresses are relative to.
pub fn read_vl_strings(
    file: &[u8],
    raw: &[u8],
    count: u64,
    offset_size: u8,
    length_size: u8,
) -> Result<Vec<String>, FormatError> {
    let mut strings = Vec::with_capacity(count as usize);
    for id in parse_heap_ids(raw, count, offset_size)? {
        let Some(address) = id.collection_address else {
            strings.push(String::new());
            continue;
        };
        let collection = GlobalHeapCollection::parse(file, address as usize, length_size)?;
        let object = u16::try_from(id.index)
            .ok()
            .and_then(|i| collection.object(i))
            .ok_or(FormatError::GlobalHeapObjectNotFound {
                collection_address: address,
                index: id.index,
            })?;
        let len = (id.length as usize).min(object.data.len());
        let bytes = &object.data[..len];
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
        strings.push(String::from_utf8_lossy(&bytes[..end]).into_owned());
    }
    Ok(strings)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// A collection with objects numbered from 1, as the library writes it.
    pub(crate) fn build_collection(objects: &[&[u8]]) -> Vec<u8> {
        let mut body = Vec::new();
        for (i, data) in objects.iter().enumerate() {
            body.extend_from_slice(&(i as u16 + 1).to_le_bytes());
            body.extend_from_slice(&1u16.to_le_bytes());
            body.extend_from_slice(&[0; 4]);
            body.extend_from_slice(&(data.len() as u64).to_le_bytes());
            body.extend_from_slice(data);
            body.resize(pad8(body.len()), 0);
        }
        // free-space object
        body.extend_from_slice(&[0; 16]);
        let mut buf = GCOL_SIGNATURE.to_vec();
        buf.extend_from_slice(&[1, 0, 0, 0]);
        buf.extend_from_slice(&((16 + body.len()) as u64).to_le_bytes());
        buf.extend_from_slice(&body);
        buf
    }

    pub(crate) fn heap_id(length: u32, address: u64, index: u32) -> Vec<u8> {
        let mut buf = length.to_le_bytes().to_vec();
        buf.extend_from_slice(&address.to_le_bytes());
        buf.extend_from_slice(&index.to_le_bytes());
        buf
    }

    #[test]
    fn objects_are_found_by_index() {
        let gcol = build_collection(&[b"planter", b"Signal Plant"]);
        let c = GlobalHeapCollection::parse(&gcol, 0, 8).unwrap();
        assert_eq!(c.collection_size, gcol.len() as u64);
        assert_eq!(c.objects.len(), 2);
        assert_eq!(c.object(2).unwrap().data, b"Signal Plant");
        assert!(c.object(3).is_none());
    }

    #[test]
    fn bad_signature_or_version() {
        let mut gcol = build_collection(&[b"x"]);
        gcol[4] = 2;
        assert_eq!(GlobalHeapCollection::parse(&gcol, 0, 8), Err(FormatError::InvalidGlobalHeapVersion(2)));
        gcol[0] = b'X';
        assert_eq!(GlobalHeapCollection::parse(&gcol, 0, 8), Err(FormatError::InvalidGlobalHeapSignature));
    }

    #[test]
    fn strings_resolve_through_the_heap() {
        let mut file = vec![0u8; 32];
        file.extend_from_slice(&build_collection(&[b"ECG lead II", b"mV"]));
        let mut raw = heap_id(2, 32, 2);
        raw.extend_from_slice(&heap_id(0, 0, 0));
        raw.extend_from_slice(&heap_id(11, 32, 1));
        assert_eq!(
            read_vl_strings(&file, &raw, 3, 8, 8).unwrap(),
            vec!["mV".to_string(), String::new(), "ECG lead II".to_string()]
        );
    }

    #[test]
    fn dangling_index_is_an_error() {
        let mut file = vec![0u8; 8];
        file.extend_from_slice(&build_collection(&[b"a"]));
        let err = read_vl_strings(&file, &heap_id(1, 8, 5), 1, 8, 8).unwrap_err();
        assert_eq!(
            err,
            FormatError::GlobalHeapObjectNotFound {
                collection_address: 8,
                index: 5
            }
        );
        assert!(read_vl_strings(&file, &heap_id(1, 8, 1)[..10], 1, 8, 8).is_err());
    }
}
