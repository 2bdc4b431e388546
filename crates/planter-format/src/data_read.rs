//! Decoding raw element bytes into Rust values.

use byteorder::{BigEndian, ByteOrder, LittleEndian};

use crate::datatype::{Datatype, DatatypeByteOrder, StringPadding};
use crate::error::FormatError;

fn elements(raw: &[u8], size: usize) -> Result<std::slice::ChunksExact<'_, u8>, FormatError> {
    if size == 0 || raw.len() % size != 0 {
        return Err(FormatError::UnsupportedDatatype(format!(
            "{} bytes is not a whole number of {size}-byte elements",
            raw.len()
        )));
    }
    Ok(raw.chunks_exact(size))
}

fn mismatch(expected: &str, datatype: &Datatype) -> FormatError {
    FormatError::UnsupportedDatatype(format!("expected {expected}, found {datatype:?}"))
}

fn decode_int(bytes: &[u8], big_endian: bool, signed: bool) -> Result<i128, FormatError> {
    let v = match (bytes.len(), big_endian) {
        (1, _) => bytes[0] as u64,
        (2, false) => LittleEndian::read_u16(bytes) as u64,
        (2, true) => BigEndian::read_u16(bytes) as u64,
        (4, false) => LittleEndian::read_u32(bytes) as u64,
        (4, true) => BigEndian::read_u32(bytes) as u64,
        (8, false) => LittleEndian::read_u64(bytes),
        (8, true) => BigEndian::read_u64(bytes),
        (n, _) => {
            return Err(FormatError::UnsupportedDatatype(format!("{n}-byte integer")));
        }
    };
    let bits = bytes.len() * 8;
    Ok(if signed && bits < 128 && v >> (bits - 1) & 1 == 1 {
        v as i128 - (1i128 << bits)
    } else {
        v as i128
    })
}

/// Decode numeric elements as `f64`, converting integers.
pub fn read_as_f64(raw: &[u8], datatype: &Datatype) -> Result<Vec<f64>, FormatError> {
    match datatype {
        Datatype::FloatingPoint { size, byte_order, .. } => {
            let be = *byte_order == DatatypeByteOrder::BigEndian;
            match (size, be) {
                (4, false) => Ok(elements(raw, 4)?.map(|b| LittleEndian::read_f32(b) as f64).collect()),
                (4, true) => Ok(elements(raw, 4)?.map(|b| BigEndian::read_f32(b) as f64).collect()),
                (8, false) => Ok(elements(raw, 8)?.map(LittleEndian::read_f64).collect()),
                (8, true) => Ok(elements(raw, 8)?.map(BigEndian::read_f64).collect()),
                _ => Err(mismatch("4- or 8-byte IEEE float", datatype)),
            }
        }
        Datatype::FixedPoint { .. } => Ok(read_as_i128(raw, datatype)?.into_iter().map(|v| v as f64).collect()),
        Datatype::Enumeration { base_type, .. } => read_as_f64(raw, base_type),
        _ => Err(mismatch("a numeric type", datatype)),
    }
}

/// Decode numeric elements as `f32`. `f32` data is copied without a
/// round trip through `f64`.
pub fn read_as_f32(raw: &[u8], datatype: &Datatype) -> Result<Vec<f32>, FormatError> {
    match datatype {
        Datatype::FloatingPoint {
            size: 4, byte_order, ..
        } => {
            if *byte_order == DatatypeByteOrder::BigEndian {
                Ok(elements(raw, 4)?.map(BigEndian::read_f32).collect())
            } else {
                Ok(elements(raw, 4)?.map(LittleEndian::read_f32).collect())
            }
        }
        _ => Ok(read_as_f64(raw, datatype)?.into_iter().map(|v| v as f32).collect()),
    }
}

fn read_as_i128(raw: &[u8], datatype: &Datatype) -> Result<Vec<i128>, FormatError> {
    match datatype {
        Datatype::FixedPoint {
            size,
            byte_order,
            signed,
            ..
        } => elements(raw, *size as usize)?
            .map(|b| decode_int(b, *byte_order == DatatypeByteOrder::BigEndian, *signed))
            .collect(),
        Datatype::Enumeration { base_type, .. } => read_as_i128(raw, base_type),
        _ => Err(mismatch("an integer type", datatype)),
    }
}

/// Decode numeric elements as `i64`. Floats are truncated toward zero.
pub fn read_as_i64(raw: &[u8], datatype: &Datatype) -> Result<Vec<i64>, FormatError> {
    match datatype {
        Datatype::FloatingPoint { .. } => Ok(read_as_f64(raw, datatype)?.into_iter().map(|v| v as i64).collect()),
        _ => Ok(read_as_i128(raw, datatype)?
            .into_iter()
            .map(|v| v.clamp(i64::MIN as i128, i64::MAX as i128) as i64)
            .collect()),
    }
}

/// Decode numeric elements as `i32`, saturating out-of-range values.
pub fn read_as_i32(raw: &[u8], datatype: &Datatype) -> Result<Vec<i32>, FormatError> {
    Ok(read_as_i64(raw, datatype)?
        .into_iter()
        .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
        .collect())
}

/// Decode fixed-length strings, removing the type's padding.
pub fn read_as_strings(raw: &[u8], datatype: &Datatype) -> Result<Vec<String>, FormatError> {
    let Datatype::String { size, padding, .. } = datatype else {
        return Err(mismatch("a fixed-length string", datatype));
    };
    Ok(elements(raw, *size as usize)?
        .map(|b| String::from_utf8_lossy(trim_padding(b, *padding)).into_owned())
        .collect())
}

fn trim_padding(bytes: &[u8], padding: StringPadding) -> &[u8] {
    let end = match padding {
        StringPadding::NullTerminate => bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len()),
        StringPadding::NullPad => bytes.iter().rposition(|&b| b != 0).map_or(0, |p| p + 1),
        StringPadding::SpacePad => bytes
            .iter()
            .rposition(|&b| b != b' ' && b != 0)
            .map_or(0, |p| p + 1),
    };
    &bytes[..end]
}

/// Gather one member of a compound dataset into its own packed buffer.
/// Returns `None` when the compound has no member named `field_name`.
pub fn read_compound_field(
    raw: &[u8],
    datatype: &Datatype,
    field_name: &str,
) -> Result<Option<(Datatype, Vec<u8>)>, FormatError> {
    let Datatype::Compound { size, members } = datatype else {
        return Err(mismatch("a compound type", datatype));
    };
    let Some(member) = members.iter().find(|m| m.name == field_name) else {
        return Ok(None);
    };
    let offset = member.byte_offset as usize;
    let width = member.datatype.type_size() as usize;
    if offset + width > *size as usize {
        return Err(FormatError::UnsupportedDatatype(format!(
            "member `{field_name}` extends past the end of its compound"
        )));
    }
    let mut out = Vec::with_capacity(raw.len() / (*size as usize).max(1) * width);
    for record in elements(raw, *size as usize)? {
        out.extend_from_slice(&record[offset..offset + width]);
    }
    Ok(Some((member.datatype.clone(), out)))
}
