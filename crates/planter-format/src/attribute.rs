//! HDF5 Attribute message (type 0x000C).

use crate::bytes::{ensure_len, pad8, read_u16};
use crate::data_read;
use crate::dataspace::Dataspace;
use crate::datatype::Datatype;
use crate::error::FormatError;

/// A parsed attribute: name, type, shape and raw element bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeMessage {
    pub name: String,
    pub datatype: Datatype,
    pub dataspace: Dataspace,
    pub raw_data: Vec<u8>,
}

fn extract_name(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

impl AttributeMessage {
    pub fn new(name: &str, datatype: Datatype, dataspace: Dataspace, raw_data: Vec<u8>) -> Self {
        AttributeMessage {
            name: name.to_string(),
            datatype,
            dataspace,
            raw_data,
        }
    }

    /// Parse versions 1-3. Version 1 pads each field to 8 bytes.
    pub fn parse(data: &[u8], length_size: u8) -> Result<AttributeMessage, FormatError> {
        ensure_len(data, 0, 8)?;
        let version = data[0];
        let flags = data[1];
        let name_size = read_u16(data, 2)? as usize;
        let datatype_size = read_u16(data, 4)? as usize;
        let dataspace_size = read_u16(data, 6)? as usize;

        let (mut pos, padded) = match version {
            1 => (8, true),
            2 => (8, false),
            // v3 adds a name character-set byte
            3 => (9, false),
            v => return Err(FormatError::InvalidAttributeVersion(v)),
        };
        if version > 1 && flags & 0x03 != 0 {
            return Err(FormatError::UnsupportedDatatype(
                "attribute with shared datatype or dataspace".into(),
            ));
        }
        let step = |n: usize| if padded { pad8(n) } else { n };

        ensure_len(data, pos, name_size)?;
        let name = extract_name(&data[pos..pos + name_size]);
        pos += step(name_size);

        ensure_len(data, pos, datatype_size)?;
        let (datatype, _) = Datatype::parse(&data[pos..pos + datatype_size])?;
        pos += step(datatype_size);

        ensure_len(data, pos, dataspace_size)?;
        let dataspace = Dataspace::parse(&data[pos..pos + dataspace_size], length_size)?;
        pos += step(dataspace_size);

        let expected = dataspace.num_elements() as usize * datatype.type_size() as usize;
        let pos = pos.min(data.len());
        let raw_data = data[pos..pos + expected.min(data.len() - pos)].to_vec();

        Ok(AttributeMessage {
            name,
            datatype,
            dataspace,
            raw_data,
        })
    }

    /// Serialize as a version 2 message.
    pub fn serialize(&self, length_size: u8) -> Result<Vec<u8>, FormatError> {
        let mut name = self.name.as_bytes().to_vec();
        name.push(0);
        let dt = self.datatype.serialize()?;
        let ds = self.dataspace.serialize(length_size);

        let mut buf = Vec::with_capacity(8 + name.len() + dt.len() + ds.len() + self.raw_data.len());
        buf.push(2);
        buf.push(0);
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        buf.extend_from_slice(&name);
        buf.extend_from_slice(&dt);
        buf.extend_from_slice(&ds);
        buf.extend_from_slice(&self.raw_data);
        Ok(buf)
    }

    pub fn read_as_f64(&self) -> Result<Vec<f64>, FormatError> {
        data_read::read_as_f64(&self.raw_data, &self.datatype)
    }

    pub fn read_as_i64(&self) -> Result<Vec<i64>, FormatError> {
        data_read::read_as_i64(&self.raw_data, &self.datatype)
    }

    pub fn read_as_strings(&self) -> Result<Vec<String>, FormatError> {
        data_read::read_as_strings(&self.raw_data, &self.datatype)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::type_builders::{make_f32_type, make_fixed_string_type, make_i64_type};

    #[test]
    fn f32_array_roundtrip() {
        let attr = AttributeMessage::new(
            "Fs",
            make_f32_type(),
            Dataspace::simple(&[1], None),
            2000.0f32.to_le_bytes().to_vec(),
        );
        let bytes = attr.serialize(8).unwrap();
        let parsed = AttributeMessage::parse(&bytes, 8).unwrap();
        assert_eq!(parsed, attr);
        assert_eq!(parsed.read_as_f64().unwrap(), vec![2000.0]);
    }

    #[test]
    fn scalar_int_and_string() {
        let attr = AttributeMessage::new(
            "LeftI",
            make_i64_type(),
            Dataspace::scalar(),
            (-3i64).to_le_bytes().to_vec(),
        );
        let parsed = AttributeMessage::parse(&attr.serialize(8).unwrap(), 8).unwrap();
        assert_eq!(parsed.read_as_i64().unwrap(), vec![-3]);

        let attr = AttributeMessage::new(
            "GeneratedBy",
            make_fixed_string_type(7),
            Dataspace::scalar(),
            b"planter".to_vec(),
        );
        let parsed = AttributeMessage::parse(&attr.serialize(8).unwrap(), 8).unwrap();
        assert_eq!(parsed.read_as_strings().unwrap(), vec!["planter".to_string()]);
    }

    #[test]
    fn parse_v1_padded_fields() {
        let dt = make_f32_type().serialize().unwrap();
        let ds = Dataspace::simple(&[1], None).serialize(8);
        let mut buf = vec![1, 0];
        buf.extend_from_slice(&3u16.to_le_bytes());
        buf.extend_from_slice(&(dt.len() as u16).to_le_bytes());
        buf.extend_from_slice(&(ds.len() as u16).to_le_bytes());
        buf.extend_from_slice(b"Fs\0\0\0\0\0\0");
        buf.extend_from_slice(&dt);
        buf.resize(buf.len() + pad8(dt.len()) - dt.len(), 0);
        buf.extend_from_slice(&ds);
        buf.resize(buf.len() + pad8(ds.len()) - ds.len(), 0);
        buf.extend_from_slice(&1.5f32.to_le_bytes());

        let parsed = AttributeMessage::parse(&buf, 8).unwrap();
        assert_eq!(parsed.name, "Fs");
        assert_eq!(parsed.read_as_f64().unwrap(), vec![1.5]);
    }

    #[test]
    fn bad_version() {
        assert_eq!(
            AttributeMessage::parse(&[9, 0, 0, 0, 0, 0, 0, 0], 8).unwrap_err(),
            FormatError::InvalidAttributeVersion(9)
        );
    }
}
