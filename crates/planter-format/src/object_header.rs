//! HDF5 object header parsing (v1 and v2).

use crate::bytes::{ensure_len, read_u16, read_u32, read_uint};
use crate::checksum::verify;
use crate::error::FormatError;
use crate::message_type::MessageType;

/// OHDR signature for v2 object headers.
pub(crate) const OHDR_SIGNATURE: [u8; 4] = *b"OHDR";

/// OCHK signature for v2 continuation chunks.
const OCHK_SIGNATURE: [u8; 4] = *b"OCHK";

/// v2 header flag: attribute creation order is tracked (messages carry it).
const FLAG_CREATION_ORDER: u8 = 0x04;
/// v2 header flag: max-compact/min-dense attribute thresholds are stored.
const FLAG_ATTR_PHASE_CHANGE: u8 = 0x10;
/// v2 header flag: access/modification/change/birth times are stored.
const FLAG_TIMES: u8 = 0x20;

/// A single parsed header message.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderMessage {
    /// The message type.
    pub msg_type: MessageType,
    /// Message flags byte.
    pub flags: u8,
    /// Raw message data bytes.
    pub data: Vec<u8>,
}

/// Parsed HDF5 object header.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectHeader {
    /// Header version (1 or 2).
    pub version: u8,
    /// All non-NIL, non-continuation messages from every chunk, in order.
    pub messages: Vec<HeaderMessage>,
}

#[derive(Clone, Copy)]
enum Format {
    V1,
    V2 { creation_order: bool },
}

impl ObjectHeader {
    /// Parse the object header at `offset`. `offset_size` and
    /// `length_size` come from the superblock.
    pub fn parse(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        ensure_len(data, offset, 4)?;
        if data[offset..offset + 4] == OHDR_SIGNATURE {
            Self::parse_v2(data, offset, offset_size, length_size)
        } else {
            Self::parse_v1(data, offset, offset_size, length_size)
        }
    }

    /// First message of the given type, if any.
    pub fn find(&self, msg_type: MessageType) -> Option<&HeaderMessage> {
        self.messages.iter().find(|m| m.msg_type == msg_type)
    }

    /// Every message of the given type.
    pub fn find_all(&self, msg_type: MessageType) -> impl Iterator<Item = &HeaderMessage> {
        self.messages.iter().filter(move |m| m.msg_type == msg_type)
    }

    fn parse_v1(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        // version reserved num_messages(2) ref_count(4) header_size(4), padded to 16
        ensure_len(data, offset, 16)?;
        let version = data[offset];
        if version != 1 {
            return Err(FormatError::InvalidObjectHeaderVersion(version));
        }
        let header_size = read_u32(data, offset + 8)? as usize;

        let mut messages = Vec::new();
        let mut pending = vec![(offset + 16, header_size)];
        while let Some((start, len)) = pending.pop() {
            ensure_len(data, start, len)?;
            walk_messages(
                data,
                start,
                start + len,
                Format::V1,
                offset_size,
                length_size,
                &mut messages,
                &mut pending,
            )?;
        }

        Ok(ObjectHeader { version: 1, messages })
    }

    fn parse_v2(
        data: &[u8],
        offset: usize,
        offset_size: u8,
        length_size: u8,
    ) -> Result<ObjectHeader, FormatError> {
        ensure_len(data, offset, 6)?;
        let version = data[offset + 4];
        if version != 2 {
            return Err(FormatError::InvalidObjectHeaderVersion(version));
        }
        let flags = data[offset + 5];

        let mut pos = offset + 6;
        if flags & FLAG_TIMES != 0 {
            pos += 16;
        }
        if flags & FLAG_ATTR_PHASE_CHANGE != 0 {
            pos += 4;
        }
        let width = 1u8 << (flags & 0x03);
        let chunk0_size = read_uint(data, pos, width)? as usize;
        pos += width as usize;

        let chunk0_end = pos + chunk0_size;
        ensure_len(data, pos, chunk0_size)?;
        verify(data, offset, chunk0_end)?;

        let format = Format::V2 {
            creation_order: flags & FLAG_CREATION_ORDER != 0,
        };
        let mut messages = Vec::new();
        let mut pending = Vec::new();
        walk_messages(
            data,
            pos,
            chunk0_end,
            format,
            offset_size,
            length_size,
            &mut messages,
            &mut pending,
        )?;

        while let Some((start, len)) = pending.pop() {
            // OCHK signature, messages, checksum
            ensure_len(data, start, len)?;
            if len < 8 || data[start..start + 4] != OCHK_SIGNATURE {
                return Err(FormatError::InvalidObjectHeaderSignature);
            }
            let end = start + len - 4;
            verify(data, start, end)?;
            walk_messages(
                data,
                start + 4,
                end,
                format,
                offset_size,
                length_size,
                &mut messages,
                &mut pending,
            )?;
        }

        Ok(ObjectHeader { version: 2, messages })
    }
}

/// Collect the messages between `start` and `end`, queueing any
/// continuation blocks they point at.
#[allow(clippy::too_many_arguments)]
fn walk_messages(
    data: &[u8],
    start: usize,
    end: usize,
    format: Format,
    offset_size: u8,
    length_size: u8,
    messages: &mut Vec<HeaderMessage>,
    pending: &mut Vec<(usize, usize)>,
) -> Result<(), FormatError> {
    let prefix = match format {
        Format::V1 => 8,
        Format::V2 { creation_order: true } => 6,
        Format::V2 { creation_order: false } => 4,
    };

    let mut pos = start;
    // Trailing bytes shorter than a message prefix are gap padding.
    while pos + prefix <= end {
        let (raw_type, size, flags) = match format {
            Format::V1 => (read_u16(data, pos)?, read_u16(data, pos + 2)? as usize, data[pos + 4]),
            Format::V2 { .. } => (data[pos] as u16, read_u16(data, pos + 1)? as usize, data[pos + 3]),
        };
        pos += prefix;
        if pos + size > end {
            return Err(FormatError::UnexpectedEof {
                expected: pos + size,
                available: end,
            });
        }

        let msg_type = MessageType::from_u16(raw_type);
        let body = &data[pos..pos + size];
        pos += size;

        match msg_type {
            MessageType::Nil => {}
            MessageType::ObjectHeaderContinuation => {
                let cont_offset = read_uint(body, 0, offset_size)? as usize;
                let cont_len = read_uint(body, offset_size as usize, length_size)? as usize;
                pending.push((cont_offset, cont_len));
            }
            MessageType::Unknown(id) if flags & 0x08 != 0 => {
                return Err(FormatError::UnsupportedMessage(id));
            }
            _ => messages.push(HeaderMessage {
                msg_type,
                flags,
                data: body.to_vec(),
            }),
        }
    }
    Ok(())
}
