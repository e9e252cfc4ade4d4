use std::fmt::{self, Display, Formatter};

use thiserror::Error;

use super::MessageId;

/// Bytes preceding the payload: the length byte and the message-id byte.
pub(crate) const HEADER_LEN: usize = 2;

/// Errors returned while decoding received frames.
#[derive(Debug, Error, Clone, Eq, PartialEq)]
pub enum MessageDecodeError {
    /// The frame cannot hold the two header bytes.
    #[error("frame is too short: expected at least 2 bytes, got {actual}")]
    MalformedFrame { actual: usize },
    /// A known message arrived with fewer payload bytes than its layout needs.
    #[error("{message_id} payload is too short: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        message_id: MessageId,
        expected: usize,
        actual: usize,
    },
}

/// Renders frame bytes as lowercase hex pairs, the form fixtures are written in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FrameHex<'a>(pub(crate) &'a [u8]);

impl Display for FrameHex<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return f.write_str("<empty>");
        }
        self.0.iter().try_for_each(|byte| write!(f, "{byte:02x}"))
    }
}

/// Header view over one received frame.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct RawFrame<'a> {
    declared_len: u8,
    message_id: u8,
    payload: &'a [u8],
}

impl<'a> RawFrame<'a> {
    /// Splits a received frame into its header and payload.
    ///
    /// # Errors
    ///
    /// Returns [`MessageDecodeError::MalformedFrame`] when fewer than two bytes
    /// were received.
    pub fn parse(bytes: &'a [u8]) -> Result<Self, MessageDecodeError> {
        let [declared_len, message_id, payload @ ..] = bytes else {
            return Err(MessageDecodeError::MalformedFrame {
                actual: bytes.len(),
            });
        };

        Ok(Self {
            declared_len: *declared_len,
            message_id: *message_id,
            payload,
        })
    }

    /// Length byte as sent: id byte plus payload bytes.
    #[must_use]
    pub fn declared_len(&self) -> u8 {
        self.declared_len
    }

    /// Raw message-id byte.
    #[must_use]
    pub fn message_id(&self) -> u8 {
        self.message_id
    }

    /// Bytes following the header.
    #[must_use]
    pub fn payload(&self) -> &'a [u8] {
        self.payload
    }
}

/// Writes one fixed-size frame field by field.
///
/// The frame is sized up front to `2 + payload_len`; bytes the variant does
/// not write stay zero.
#[derive(Debug)]
pub(crate) struct FrameBuilder {
    bytes: Vec<u8>,
    payload_len: usize,
}

impl FrameBuilder {
    pub(crate) fn new(message_id: MessageId, payload_len: u8) -> Self {
        let payload_len = usize::from(payload_len);
        let mut bytes = Vec::with_capacity(HEADER_LEN + payload_len);
        bytes.push(u8::try_from(payload_len + 1).unwrap_or(u8::MAX));
        bytes.push(message_id.as_byte());
        Self { bytes, payload_len }
    }

    pub(crate) fn u8(mut self, value: u8) -> Self {
        self.bytes.push(value);
        self
    }

    pub(crate) fn u16(mut self, value: u16) -> Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn f32(mut self, value: f32) -> Self {
        self.bytes.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub(crate) fn finish(mut self) -> Vec<u8> {
        self.bytes.resize(HEADER_LEN + self.payload_len, 0);
        self.bytes
    }
}

/// Sequential little-endian reader over a payload whose length was checked.
#[derive(Debug)]
pub(crate) struct PayloadReader<'a> {
    remaining: &'a [u8],
}

impl<'a> PayloadReader<'a> {
    /// Starts reading `frame` as `message_id`, requiring `expected` payload bytes.
    pub(crate) fn new(
        frame: &RawFrame<'a>,
        message_id: MessageId,
        expected: usize,
    ) -> Result<Self, MessageDecodeError> {
        let payload = frame.payload();
        if payload.len() < expected {
            return Err(MessageDecodeError::LengthMismatch {
                message_id,
                expected,
                actual: payload.len(),
            });
        }

        Ok(Self { remaining: payload })
    }

    pub(crate) fn u8(&mut self) -> u8 {
        self.take::<1>().map_or(0, |[value]| value)
    }

    pub(crate) fn i8(&mut self) -> i8 {
        i8::from_le_bytes(self.take::<1>().unwrap_or_default())
    }

    pub(crate) fn u16(&mut self) -> u16 {
        u16::from_le_bytes(self.take::<2>().unwrap_or_default())
    }

    pub(crate) fn f32(&mut self) -> f32 {
        f32::from_le_bytes(self.take::<4>().unwrap_or_default())
    }

    // Length is validated in `new`; the fallbacks only guard layout typos.
    fn take<const N: usize>(&mut self) -> Option<[u8; N]> {
        let (head, tail) = self.remaining.split_first_chunk::<N>()?;
        self.remaining = tail;
        Some(*head)
    }
}
