//! HDF5 Datatype message (type 0x0003).
//!
//! Every class is parsed far enough to know its size and how many bytes
//! it occupies, so that compound members of any class can be skipped.
//! Fixed-point, floating-point, string, compound and variable-length
//! types can also be serialized.

use byteorder::{ByteOrder, LittleEndian};

use crate::bytes::{ensure_len, pad8, read_cstr, read_u32, read_uint};
use crate::error::FormatError;

/// Byte order of numeric data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatatypeByteOrder {
    LittleEndian,
    BigEndian,
    Vax,
}

/// String padding type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringPadding {
    NullTerminate,
    NullPad,
    SpacePad,
}

/// Character set encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CharacterSet {
    Ascii,
    Utf8,
}

/// A member of a compound datatype.
#[derive(Debug, Clone, PartialEq)]
pub struct CompoundMember {
    /// Member name.
    pub name: String,
    /// Byte offset within the compound.
    pub byte_offset: u64,
    /// Member datatype.
    pub datatype: Datatype,
}

/// Parsed HDF5 datatype.
#[derive(Debug, Clone, PartialEq)]
pub enum Datatype {
    /// Class 0: integers.
    FixedPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        signed: bool,
        bit_offset: u16,
        bit_precision: u16,
    },
    /// Class 1: IEEE floats.
    FloatingPoint {
        size: u32,
        byte_order: DatatypeByteOrder,
        bit_offset: u16,
        bit_precision: u16,
        exponent_location: u8,
        exponent_size: u8,
        mantissa_location: u8,
        mantissa_size: u8,
        exponent_bias: u32,
    },
    /// Class 3: fixed-length string.
    String {
        size: u32,
        padding: StringPadding,
        charset: CharacterSet,
    },
    /// Class 6: compound (record) type.
    Compound {
        size: u32,
        members: Vec<CompoundMember>,
    },
    /// Class 8: enumeration. Only the base type is kept.
    Enumeration {
        size: u32,
        base_type: Box<Datatype>,
        names: Vec<String>,
    },
    /// Class 9: variable-length sequence or string.
    VariableLength {
        is_string: bool,
        base_type: Box<Datatype>,
    },
    /// Class 10: fixed-size array of a base type.
    Array {
        base_type: Box<Datatype>,
        dimensions: Vec<u32>,
    },
    /// Time, bitfield, opaque and reference classes.
    Other { class: u8, size: u32 },
}

fn parse_string_padding(val: u8) -> Result<StringPadding, FormatError> {
    match val {
        0 => Ok(StringPadding::NullTerminate),
        1 => Ok(StringPadding::NullPad),
        2 => Ok(StringPadding::SpacePad),
        _ => Err(FormatError::InvalidStringPadding(val)),
    }
}

fn parse_charset(val: u8) -> Result<CharacterSet, FormatError> {
    match val {
        0 => Ok(CharacterSet::Ascii),
        1 => Ok(CharacterSet::Utf8),
        _ => Err(FormatError::InvalidCharacterSet(val)),
    }
}

fn parse_byte_order(bf0: u8) -> DatatypeByteOrder {
    match (bf0 & 0x40 != 0, bf0 & 0x01 != 0) {
        (false, false) => DatatypeByteOrder::LittleEndian,
        (false, true) => DatatypeByteOrder::BigEndian,
        (true, _) => DatatypeByteOrder::Vax,
    }
}

/// Bytes used for a member offset in a version 3 compound of `compound_size`.
fn offset_width(compound_size: u32) -> u8 {
    match compound_size {
        0..=0xFF => 1,
        0x100..=0xFFFF => 2,
        _ => 4,
    }
}

/// Read a member name; versions 1 and 2 pad it (with its NUL) to 8 bytes.
fn read_member_name(data: &[u8], pos: usize, version: u8) -> Result<(String, usize), FormatError> {
    let (name, consumed) = read_cstr(data, pos)?;
    let consumed = if version < 3 { pad8(consumed) } else { consumed };
    ensure_len(data, pos, consumed)?;
    Ok((name, consumed))
}

impl Datatype {
    /// Parse a datatype message.
    ///
    /// Returns the datatype and the number of bytes it occupies.
    pub fn parse(data: &[u8]) -> Result<(Datatype, usize), FormatError> {
        ensure_len(data, 0, 8)?;
        let class = data[0] & 0x0F;
        let version = data[0] >> 4;
        let bf0 = data[1];
        let bf1 = data[2];
        let size = LittleEndian::read_u32(&data[4..8]);
        let mut pos = 8;

        let dt = match class {
            0 => {
                ensure_len(data, pos, 4)?;
                let dt = Datatype::FixedPoint {
                    size,
                    byte_order: parse_byte_order(bf0 & 0x01),
                    signed: bf0 & 0x08 != 0,
                    bit_offset: LittleEndian::read_u16(&data[pos..pos + 2]),
                    bit_precision: LittleEndian::read_u16(&data[pos + 2..pos + 4]),
                };
                pos += 4;
                dt
            }
            1 => {
                ensure_len(data, pos, 12)?;
                let p = &data[pos..pos + 12];
                let dt = Datatype::FloatingPoint {
                    size,
                    byte_order: parse_byte_order(bf0),
                    bit_offset: LittleEndian::read_u16(&p[0..2]),
                    bit_precision: LittleEndian::read_u16(&p[2..4]),
                    exponent_location: p[4],
                    exponent_size: p[5],
                    mantissa_location: p[6],
                    mantissa_size: p[7],
                    exponent_bias: LittleEndian::read_u32(&p[8..12]),
                };
                pos += 12;
                dt
            }
            2 => {
                pos += 2;
                Datatype::Other { class, size }
            }
            3 => Datatype::String {
                size,
                padding: parse_string_padding(bf0 & 0x0F)?,
                charset: parse_charset(bf0 >> 4)?,
            },
            4 => {
                pos += 4;
                Datatype::Other { class, size }
            }
            5 => {
                // ASCII tag, NUL padded to a multiple of 8
                pos += pad8(bf0 as usize);
                Datatype::Other { class, size }
            }
            6 => {
                let count = u16::from_le_bytes([bf0, bf1]) as usize;
                let mut members = Vec::with_capacity(count);
                for _ in 0..count {
                    let member = match version {
                        1 | 2 => parse_member_v1v2(data, &mut pos, version)?,
                        3 => {
                            let (name, consumed) = read_member_name(data, pos, 3)?;
                            pos += consumed;
                            let width = offset_width(size);
                            let byte_offset = read_uint(data, pos, width)?;
                            pos += width as usize;
                            let (datatype, consumed) = Datatype::parse(&data[pos..])?;
                            pos += consumed;
                            CompoundMember {
                                name,
                                byte_offset,
                                datatype,
                            }
                        }
                        _ => return Err(FormatError::InvalidDatatypeVersion { class, version }),
                    };
                    members.push(member);
                }
                Datatype::Compound { size, members }
            }
            7 => Datatype::Other { class, size },
            8 => {
                let count = u16::from_le_bytes([bf0, bf1]) as usize;
                let (base, consumed) = Datatype::parse(&data[pos..])?;
                pos += consumed;
                let mut names = Vec::with_capacity(count);
                for _ in 0..count {
                    let (name, consumed) = read_member_name(data, pos, version)?;
                    pos += consumed;
                    names.push(name);
                }
                let values = count * base.type_size() as usize;
                ensure_len(data, pos, values)?;
                pos += values;
                Datatype::Enumeration {
                    size,
                    base_type: Box::new(base),
                    names,
                }
            }
            9 => {
                let (base, consumed) = Datatype::parse(&data[pos..])?;
                pos += consumed;
                Datatype::VariableLength {
                    is_string: bf0 & 0x0F == 1,
                    base_type: Box::new(base),
                }
            }
            10 => {
                ensure_len(data, pos, 1)?;
                let rank = data[pos] as usize;
                pos += if version == 2 { 4 } else { 1 };
                let mut dimensions = Vec::with_capacity(rank);
                for _ in 0..rank {
                    dimensions.push(read_u32(data, pos)?);
                    pos += 4;
                }
                if version == 2 {
                    // permutation indices
                    pos += 4 * rank;
                }
                let (base, consumed) = Datatype::parse(&data[pos..])?;
                pos += consumed;
                Datatype::Array {
                    base_type: Box::new(base),
                    dimensions,
                }
            }
            _ => return Err(FormatError::InvalidDatatypeClass(class)),
        };

        ensure_len(data, 0, pos)?;
        Ok((dt, pos))
    }

    /// Size in bytes of one element of this type.
    pub fn type_size(&self) -> u32 {
        match self {
            Datatype::FixedPoint { size, .. }
            | Datatype::FloatingPoint { size, .. }
            | Datatype::String { size, .. }
            | Datatype::Compound { size, .. }
            | Datatype::Enumeration { size, .. }
            | Datatype::Other { size, .. } => *size,
            // length(4) + global heap address(8) + object index(4)
            Datatype::VariableLength { .. } => 16,
            Datatype::Array {
                base_type,
                dimensions,
            } => base_type.type_size() * dimensions.iter().product::<u32>(),
        }
    }

    /// True for types whose elements live outside the dataset's raw bytes.
    pub fn is_variable_length(&self) -> bool {
        match self {
            Datatype::VariableLength { .. } => true,
            Datatype::Compound { members, .. } => {
                members.iter().any(|m| m.datatype.is_variable_length())
            }
            Datatype::Array { base_type, .. } => base_type.is_variable_length(),
            _ => false,
        }
    }

    /// Serialize to datatype message bytes.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        match self {
            Datatype::FixedPoint {
                size,
                byte_order,
                signed,
                bit_offset,
                bit_precision,
            } => {
                let mut bf0 = 0u8;
                if *byte_order == DatatypeByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                if *signed {
                    bf0 |= 0x08;
                }
                let mut buf = header(0, 1, [bf0, 0, 0], *size);
                buf.extend_from_slice(&bit_offset.to_le_bytes());
                buf.extend_from_slice(&bit_precision.to_le_bytes());
                Ok(buf)
            }
            Datatype::FloatingPoint {
                size,
                byte_order,
                bit_offset,
                bit_precision,
                exponent_location,
                exponent_size,
                mantissa_location,
                mantissa_size,
                exponent_bias,
            } => {
                // implied leading mantissa bit
                let mut bf0 = 0x20u8;
                if *byte_order == DatatypeByteOrder::BigEndian {
                    bf0 |= 0x01;
                }
                let sign_location = (*bit_offset + *bit_precision).saturating_sub(1) as u8;
                let mut buf = header(1, 1, [bf0, sign_location, 0], *size);
                buf.extend_from_slice(&bit_offset.to_le_bytes());
                buf.extend_from_slice(&bit_precision.to_le_bytes());
                buf.extend_from_slice(&[
                    *exponent_location,
                    *exponent_size,
                    *mantissa_location,
                    *mantissa_size,
                ]);
                buf.extend_from_slice(&exponent_bias.to_le_bytes());
                Ok(buf)
            }
            Datatype::String {
                size,
                padding,
                charset,
            } => {
                let pad = match padding {
                    StringPadding::NullTerminate => 0,
                    StringPadding::NullPad => 1,
                    StringPadding::SpacePad => 2,
                };
                let cset = match charset {
                    CharacterSet::Ascii => 0,
                    CharacterSet::Utf8 => 1,
                };
                Ok(header(3, 1, [pad | (cset << 4), 0, 0], *size))
            }
            Datatype::Compound { size, members } => {
                let count = members.len() as u16;
                let [lo, hi] = count.to_le_bytes();
                let mut buf = header(6, 1, [lo, hi, 0], *size);
                for m in members {
                    let start = buf.len();
                    buf.extend_from_slice(m.name.as_bytes());
                    buf.push(0);
                    buf.resize(start + pad8(buf.len() - start), 0);
                    buf.extend_from_slice(&(m.byte_offset as u32).to_le_bytes());
                    // dimensionality, reserved(3), permutation, reserved, 4 dim sizes
                    buf.extend_from_slice(&[0u8; 28]);
                    buf.extend_from_slice(&m.datatype.serialize()?);
                }
                Ok(buf)
            }
            Datatype::VariableLength { is_string, base_type } => {
                // null-terminated ASCII when a string
                let mut buf = header(9, 1, [u8::from(*is_string), 0, 0], 16);
                buf.extend_from_slice(&base_type.serialize()?);
                Ok(buf)
            }
            other => Err(FormatError::UnsupportedDatatype(format!(
                "cannot write {other:?}"
            ))),
        }
    }
}

/// Version 1/2 compound member. Version 1 carries an array description
/// after the offset; members with a non-zero dimensionality become arrays.
fn parse_member_v1v2(
    data: &[u8],
    pos: &mut usize,
    version: u8,
) -> Result<CompoundMember, FormatError> {
    let (name, consumed) = read_member_name(data, *pos, version)?;
    *pos += consumed;
    let byte_offset = read_u32(data, *pos)? as u64;
    *pos += 4;

    let mut dims = Vec::new();
    if version == 1 {
        ensure_len(data, *pos, 28)?;
        let rank = (data[*pos] as usize).min(4);
        for i in 0..rank {
            dims.push(read_u32(data, *pos + 12 + 4 * i)?);
        }
        *pos += 28;
    }

    let (base, consumed) = Datatype::parse(&data[*pos..])?;
    *pos += consumed;
    let datatype = if dims.is_empty() {
        base
    } else {
        Datatype::Array {
            base_type: Box::new(base),
            dimensions: dims,
        }
    };
    Ok(CompoundMember {
        name,
        byte_offset,
        datatype,
    })
}

fn header(class: u8, version: u8, bf: [u8; 3], size: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(24);
    buf.push((version << 4) | class);
    buf.extend_from_slice(&bf);
    buf.extend_from_slice(&size.to_le_bytes());
    buf
}
