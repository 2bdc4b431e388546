//! Object header writer for the v2 format.

use crate::bytes::write_uint;
use crate::checksum::jenkins_lookup3;
use crate::error::FormatError;
use crate::message_type::MessageType;
use crate::object_header::OHDR_SIGNATURE;

/// Header message flag: the message is constant.
pub const MSG_FLAG_CONSTANT: u8 = 0x01;

/// Writer for v2 object headers (OHDR + messages + lookup3 checksum).
#[derive(Debug, Default)]
pub struct ObjectHeaderWriter {
    messages: Vec<(MessageType, Vec<u8>, u8)>,
}

impl ObjectHeaderWriter {
    /// Create a new empty object header writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message with default flags (0).
    pub fn add_message(&mut self, msg_type: MessageType, data: Vec<u8>) {
        self.messages.push((msg_type, data, 0));
    }

    /// Add a message with specific flags.
    pub fn add_message_with_flags(&mut self, msg_type: MessageType, data: Vec<u8>, flags: u8) {
        self.messages.push((msg_type, data, flags));
    }

    /// Builder-style [`add_message`](Self::add_message).
    pub fn with_message(mut self, msg_type: MessageType, data: Vec<u8>) -> Self {
        self.add_message(msg_type, data);
        self
    }

    /// Serialize the complete header.
    pub fn serialize(&self) -> Result<Vec<u8>, FormatError> {
        let oversized = self
            .messages
            .iter()
            .map(|(_, data, _)| data.len())
            .find(|&len| len > u16::MAX as usize);
        if let Some(len) = oversized {
            return Err(FormatError::MessageTooLarge(len));
        }

        // type(1) + size(2) + flags(1) + data
        let chunk_size: usize = self.messages.iter().map(|(_, data, _)| 4 + data.len()).sum();
        let (size_flag, width) = match chunk_size {
            0..=0xFF => (0x00u8, 1u8),
            0x100..=0xFFFF => (0x01, 2),
            _ => (0x02, 4),
        };

        let mut buf = Vec::with_capacity(6 + width as usize + chunk_size + 4);
        buf.extend_from_slice(&OHDR_SIGNATURE);
        buf.push(2);
        buf.push(size_flag);
        write_uint(&mut buf, chunk_size as u64, width);

        for (msg_type, data, flags) in &self.messages {
            buf.push(msg_type.to_u16() as u8);
            buf.extend_from_slice(&(data.len() as u16).to_le_bytes());
            buf.push(*flags);
            buf.extend_from_slice(data);
        }

        let checksum = jenkins_lookup3(&buf);
        buf.extend_from_slice(&checksum.to_le_bytes());
        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_header::ObjectHeader;

    #[test]
    fn empty_header_roundtrip() {
        let bytes = ObjectHeaderWriter::new().serialize().unwrap();
        let hdr = ObjectHeader::parse(&bytes, 0, 8, 8).unwrap();
        assert_eq!(hdr.version, 2);
        assert!(hdr.messages.is_empty());
    }

    #[test]
    fn messages_keep_order_and_flags() {
        let mut writer = ObjectHeaderWriter::new();
        writer.add_message_with_flags(MessageType::Datatype, vec![5, 6], MSG_FLAG_CONSTANT);
        writer.add_message(MessageType::Dataspace, vec![1, 2, 3, 4]);
        let hdr = ObjectHeader::parse(&writer.serialize().unwrap(), 0, 8, 8).unwrap();
        assert_eq!(hdr.messages.len(), 2);
        assert_eq!(hdr.messages[0].msg_type, MessageType::Datatype);
        assert_eq!(hdr.messages[0].flags, MSG_FLAG_CONSTANT);
        assert_eq!(hdr.messages[1].data, vec![1, 2, 3, 4]);
    }

    #[test]
    fn wide_chunk_size_field() {
        let writer = ObjectHeaderWriter::new().with_message(MessageType::Attribute, vec![0xAA; 70_000 / 2]);
        let bytes = writer.serialize().unwrap();
        assert_eq!(bytes[5] & 0x03, 0x01);
        let hdr = ObjectHeader::parse(&bytes, 0, 8, 8).unwrap();
        assert_eq!(hdr.messages[0].data.len(), 35_000);
    }

    #[test]
    fn oversized_message_is_an_error() {
        let writer = ObjectHeaderWriter::new().with_message(MessageType::Attribute, vec![0; 70_000]);
        assert_eq!(writer.serialize().unwrap_err(), FormatError::MessageTooLarge(70_000));
    }
}
