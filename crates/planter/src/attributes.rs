//! Root attributes: typed values and the attribute editor.

use std::fmt;

use log::debug;
pub use serde_json::Value;

use planter_format::attribute::AttributeMessage;
use planter_format::dataspace::{Dataspace, DataspaceType};
use planter_format::datatype::Datatype;
use planter_format::type_builders::{make_f32_type, make_f64_type, make_fixed_string_type, make_i64_type};
use planter_format::{FileReader, FormatError};

use crate::error::Result;
use crate::handle::ContainerHandle;

/// Attribute name of the sampling frequency.
pub const FS_ATTR: &str = "Fs";
/// Name of the tool that created the file.
pub const GENERATED_BY_ATTR: &str = "GeneratedBy";
/// Left end of the view window, in samples.
pub const LEFT_INDEX_ATTR: &str = "LeftI";
/// Right end of the view window, in samples.
pub const RIGHT_INDEX_ATTR: &str = "RightI";

/// A root attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// One-dimensional `float32` array; user attributes and `Fs` use a
    /// single element.
    F32Array(Vec<f32>),
    /// Scalar `float64`.
    F64(f64),
    /// Any other floating-point array, widened to `float64`.
    F64Array(Vec<f64>),
    /// Scalar integer, widened to `int64`.
    I64(i64),
    /// Integer array, widened to `int64`.
    I64Array(Vec<i64>),
    /// Scalar string. Written back as a fixed-length string even when it
    /// was stored with variable length.
    String(String),
    /// String array, written back fixed-length at the longest width.
    StringArray(Vec<String>),
}

/// The runtime type of an [`AttrValue`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    F32Array,
    F64,
    F64Array,
    I64,
    I64Array,
    String,
    StringArray,
}

impl fmt::Display for AttrKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            AttrKind::F32Array => "float32 array",
            AttrKind::F64 => "float64",
            AttrKind::F64Array => "float64 array",
            AttrKind::I64 => "int64",
            AttrKind::I64Array => "int64 array",
            AttrKind::String => "string",
            AttrKind::StringArray => "string array",
        })
    }
}

fn is_scalar(ds: &Dataspace) -> bool {
    ds.space_type == DataspaceType::Scalar
}

impl AttrValue {
    pub fn kind(&self) -> AttrKind {
        match self {
            AttrValue::F32Array(_) => AttrKind::F32Array,
            AttrValue::F64(_) => AttrKind::F64,
            AttrValue::F64Array(_) => AttrKind::F64Array,
            AttrValue::I64(_) => AttrKind::I64,
            AttrValue::I64Array(_) => AttrKind::I64Array,
            AttrValue::String(_) => AttrKind::String,
            AttrValue::StringArray(_) => AttrKind::StringArray,
        }
    }

    /// First numeric element, if the value is numeric.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::F32Array(v) => v.first().map(|&x| x as f64),
            AttrValue::F64(x) => Some(*x),
            AttrValue::F64Array(v) => v.first().copied(),
            AttrValue::I64(x) => Some(*x as f64),
            AttrValue::I64Array(v) => v.first().map(|&x| x as f64),
            AttrValue::String(_) | AttrValue::StringArray(_) => None,
        }
    }

    fn from_strings(scalar: bool, mut v: Vec<String>) -> AttrValue {
        if scalar && v.len() == 1 {
            AttrValue::String(v.remove(0))
        } else {
            AttrValue::StringArray(v)
        }
    }

    /// Decode an attribute of `reader`'s root group. Variable-length
    /// strings are resolved through the file's global heap.
    pub fn read(msg: &AttributeMessage, reader: &FileReader) -> std::result::Result<AttrValue, FormatError> {
        match &msg.datatype {
            Datatype::VariableLength { is_string: true, .. } => {
                let strings = reader.read_vl_strings(&msg.raw_data, msg.dataspace.num_elements())?;
                Ok(Self::from_strings(is_scalar(&msg.dataspace), strings))
            }
            _ => Self::from_message(msg),
        }
    }

    /// Decode a self-contained attribute. Variable-length and compound
    /// types are rejected.
    pub fn from_message(msg: &AttributeMessage) -> std::result::Result<AttrValue, FormatError> {
        let scalar = is_scalar(&msg.dataspace);
        match &msg.datatype {
            Datatype::FloatingPoint { size: 4, .. } if !scalar => Ok(AttrValue::F32Array(
                planter_format::data_read::read_as_f32(&msg.raw_data, &msg.datatype)?,
            )),
            Datatype::FloatingPoint { .. } => {
                let v = msg.read_as_f64()?;
                Ok(match (scalar, v.first()) {
                    (true, Some(&x)) => AttrValue::F64(x),
                    _ => AttrValue::F64Array(v),
                })
            }
            Datatype::FixedPoint { .. } | Datatype::Enumeration { .. } => {
                let v = msg.read_as_i64()?;
                Ok(match (scalar, v.first()) {
                    (true, Some(&x)) => AttrValue::I64(x),
                    _ => AttrValue::I64Array(v),
                })
            }
            Datatype::String { .. } => Ok(Self::from_strings(scalar, msg.read_as_strings()?)),
            other => Err(FormatError::UnsupportedDatatype(format!(
                "attribute `{}` of type {other:?}",
                msg.name
            ))),
        }
    }

    pub fn to_message(&self, name: &str) -> AttributeMessage {
        let array = |n: usize| Dataspace::simple(&[n as u64], None);
        match self {
            AttrValue::F32Array(v) => AttributeMessage::new(
                name,
                make_f32_type(),
                array(v.len()),
                v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ),
            AttrValue::F64(x) => {
                AttributeMessage::new(name, make_f64_type(), Dataspace::scalar(), x.to_le_bytes().to_vec())
            }
            AttrValue::F64Array(v) => AttributeMessage::new(
                name,
                make_f64_type(),
                array(v.len()),
                v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ),
            AttrValue::I64(x) => {
                AttributeMessage::new(name, make_i64_type(), Dataspace::scalar(), x.to_le_bytes().to_vec())
            }
            AttrValue::I64Array(v) => AttributeMessage::new(
                name,
                make_i64_type(),
                array(v.len()),
                v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            ),
            AttrValue::String(s) => {
                let datatype = make_fixed_string_type(s.len() as u32);
                let mut raw = s.as_bytes().to_vec();
                raw.resize(datatype.type_size() as usize, 0);
                AttributeMessage::new(name, datatype, Dataspace::scalar(), raw)
            }
            AttrValue::StringArray(v) => {
                let width = v.iter().map(String::len).max().unwrap_or(0);
                let datatype = make_fixed_string_type(width as u32);
                let width = datatype.type_size() as usize;
                let mut raw = Vec::with_capacity(width * v.len());
                for s in v {
                    let start = raw.len();
                    raw.extend_from_slice(s.as_bytes());
                    raw.resize(start + width, 0);
                }
                AttributeMessage::new(name, datatype, array(v.len()), raw)
            }
        }
    }
}

/// Editor over the root attributes of an open container.
pub struct AttributeEditor<'a> {
    handle: &'a mut ContainerHandle,
}

impl<'a> AttributeEditor<'a> {
    pub(crate) fn new(handle: &'a mut ContainerHandle) -> Self {
        AttributeEditor { handle }
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.handle.container().attributes.get(name)
    }

    /// Type of the attribute `name`, if present.
    pub fn attr_type(&self, name: &str) -> Option<AttrKind> {
        self.get(name).map(AttrValue::kind)
    }

    /// All attribute names.
    pub fn list(&self) -> Vec<String> {
        self.handle.container().attributes.keys().cloned().collect()
    }

    /// The `Fs` attribute, `NaN` when it was created without a value.
    pub fn sampling_frequency(&self) -> Option<f32> {
        self.get(FS_ATTR).and_then(AttrValue::as_f64).map(|v| v as f32)
    }

    /// Store or replace one attribute.
    pub fn set(&mut self, name: &str, value: AttrValue) -> Result<()> {
        self.handle.container_mut()?.attributes.insert(name.to_string(), value);
        Ok(())
    }

    /// Store every numeric entry of a JSON object as a one-element
    /// `float32` array; booleans count as `0` and `1`. Other values are
    /// skipped, and anything but an object is ignored.
    pub fn add_attributes(&mut self, attrs: &Value) -> Result<()> {
        self.handle.ensure_writable()?;
        let Some(map) = attrs.as_object() else {
            return Ok(());
        };
        let numeric: Vec<(&String, f32)> = map
            .iter()
            .filter_map(|(name, value)| match numeric_value(value) {
                Some(v) => Some((name, v as f32)),
                None => {
                    debug!("skipping non-numeric attribute `{name}`");
                    None
                }
            })
            .collect();
        if numeric.is_empty() {
            return Ok(());
        }
        let container = self.handle.container_mut()?;
        for (name, v) in numeric {
            container.attributes.insert(name.clone(), AttrValue::F32Array(vec![v]));
        }
        Ok(())
    }

    /// Remove the named attributes; absent names are ignored.
    pub fn remove_attributes<I, S>(&mut self, names: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.handle.ensure_writable()?;
        let present: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .filter(|n| self.handle.container().attributes.contains_key(n))
            .collect();
        if present.is_empty() {
            return Ok(());
        }
        let container = self.handle.container_mut()?;
        for name in &present {
            container.attributes.remove(name);
        }
        Ok(())
    }
}

fn numeric_value(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        other => other.as_f64(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(v: &AttrValue) -> AttrValue {
        let msg = v.to_message("x");
        let parsed = AttributeMessage::parse(&msg.serialize(8).unwrap(), 8).unwrap();
        AttrValue::from_message(&parsed).unwrap()
    }

    #[test]
    fn every_kind_survives_encoding() {
        for v in [
            AttrValue::F32Array(vec![2000.0]),
            AttrValue::F64(1.5),
            AttrValue::F64Array(vec![1.0, 2.0]),
            AttrValue::I64(-7),
            AttrValue::I64Array(vec![1, 2, 3]),
            AttrValue::String("planter".into()),
            AttrValue::StringArray(vec!["a".into(), "bcd".into()]),
        ] {
            assert_eq!(roundtrip(&v), v);
        }
    }

    #[test]
    fn nan_sampling_frequency_is_kept() {
        let AttrValue::F32Array(v) = roundtrip(&AttrValue::F32Array(vec![f32::NAN])) else {
            panic!("wrong kind");
        };
        assert!(v[0].is_nan());
    }

    #[test]
    fn vl_string_is_unsupported() {
        let msg = AttributeMessage::new(
            "vl",
            Datatype::VariableLength {
                is_string: true,
                base_type: Box::new(make_fixed_string_type(1)),
            },
            Dataspace::scalar(),
            vec![0; 16],
        );
        assert!(AttrValue::from_message(&msg).is_err());
    }

    #[test]
    fn booleans_count_as_numbers() {
        assert_eq!(numeric_value(&Value::Bool(true)), Some(1.0));
        assert_eq!(numeric_value(&Value::Bool(false)), Some(0.0));
        assert_eq!(numeric_value(&serde_json::json!(2.5)), Some(2.5));
        assert_eq!(numeric_value(&serde_json::json!("2.5")), None);
        assert_eq!(numeric_value(&Value::Null), None);
    }

    #[test]
    fn kinds_display() {
        assert_eq!(AttrValue::F32Array(vec![1.0]).kind().to_string(), "float32 array");
        assert_eq!(AttrValue::String(String::new()).as_f64(), None);
        assert_eq!(AttrValue::I64(3).as_f64(), Some(3.0));
    }
}
