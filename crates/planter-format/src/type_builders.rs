//! Datatype constructors and the compound type builder.

use crate::datatype::{CharacterSet, CompoundMember, Datatype, DatatypeByteOrder, StringPadding};

pub fn make_f64_type() -> Datatype {
    Datatype::FloatingPoint {
        size: 8,
        byte_order: DatatypeByteOrder::LittleEndian,
        bit_offset: 0,
        bit_precision: 64,
        exponent_location: 52,
        exponent_size: 11,
        mantissa_location: 0,
        mantissa_size: 52,
        exponent_bias: 1023,
    }
}

pub fn make_f32_type() -> Datatype {
    Datatype::FloatingPoint {
        size: 4,
        byte_order: DatatypeByteOrder::LittleEndian,
        bit_offset: 0,
        bit_precision: 32,
        exponent_location: 23,
        exponent_size: 8,
        mantissa_location: 0,
        mantissa_size: 23,
        exponent_bias: 127,
    }
}

pub fn make_i32_type() -> Datatype {
    make_int_type(4)
}

pub fn make_i64_type() -> Datatype {
    make_int_type(8)
}

fn make_int_type(size: u32) -> Datatype {
    Datatype::FixedPoint {
        size,
        byte_order: DatatypeByteOrder::LittleEndian,
        signed: true,
        bit_offset: 0,
        bit_precision: (size * 8) as u16,
    }
}

/// Fixed-length, NUL-padded ASCII string of `size` bytes (numpy `S<size>`).
pub fn make_fixed_string_type(size: u32) -> Datatype {
    Datatype::String {
        size: size.max(1),
        padding: StringPadding::NullPad,
        charset: CharacterSet::Ascii,
    }
}

/// Builder for packed compound (record) datatypes.
#[derive(Debug, Default)]
pub struct CompoundTypeBuilder {
    fields: Vec<(String, Datatype)>,
}

impl CompoundTypeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a named field with the given datatype.
    pub fn field(mut self, name: &str, datatype: Datatype) -> Self {
        self.fields.push((name.to_string(), datatype));
        self
    }

    pub fn f32_field(self, name: &str) -> Self {
        self.field(name, make_f32_type())
    }

    pub fn i32_field(self, name: &str) -> Self {
        self.field(name, make_i32_type())
    }

    pub fn string_field(self, name: &str, size: u32) -> Self {
        self.field(name, make_fixed_string_type(size))
    }

    /// Lay the fields out back to back with no alignment padding.
    pub fn build(self) -> Datatype {
        let mut offset = 0u64;
        let mut members = Vec::with_capacity(self.fields.len());
        for (name, datatype) in self.fields {
            let size = datatype.type_size() as u64;
            members.push(CompoundMember {
                name,
                byte_offset: offset,
                datatype,
            });
            offset += size;
        }
        Datatype::Compound {
            size: offset as u32,
            members,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn packed_offsets() {
        let Datatype::Compound { size, members } = CompoundTypeBuilder::new()
            .i32_field("SampleLeft")
            .i32_field("SampleRight")
            .string_field("Group", 256)
            .f32_field("Validity")
            .build()
        else {
            panic!("expected compound");
        };
        assert_eq!(size, 268);
        let offsets: Vec<u64> = members.iter().map(|m| m.byte_offset).collect();
        assert_eq!(offsets, vec![0, 4, 8, 264]);
    }

    #[test]
    fn empty_string_type_gets_one_byte() {
        assert_eq!(make_fixed_string_type(0).type_size(), 1);
    }
}
