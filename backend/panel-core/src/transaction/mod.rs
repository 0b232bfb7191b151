//! Self-describing transaction buffers.
//!
//! A [`Transaction`] is an append-only sequence of tagged fields with a
//! single read cursor. Readers must take fields back out in the same order
//! and with the same types the writer used; there is no random access. The
//! only way to re-read part of a transaction is to save a [`Cursor`] and
//! [`Transaction::restore`] it later.
//!
//! # Wire format
//!
//! ```text
//! frame   := u32 LE payload length, payload
//! payload := field*
//! field   := u8 tag, body
//! ```

pub mod field;
pub mod opcode;
pub mod records;
pub mod socket;

pub use field::{FieldReader, FieldTag, WideString, WireDecode, WireEncode};
pub use opcode::Opcode;
pub use socket::FrameLimits;

use crate::error::codec::CodecError;

use common::{ErrorLocation, SessionKey};

use std::panic::Location;

/// Saved read position of a [`Transaction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(usize);

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Transaction {
    buf: Vec<u8>,
    pos: usize,
}

impl Transaction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a received payload. The cursor starts at the first field.
    pub fn from_bytes(buf: Vec<u8>) -> Self {
        Self { buf, pos: 0 }
    }

    /// `[Request][key]`, the prefix of every post-handshake request.
    pub fn request(key: &SessionKey) -> Self {
        let mut trans = Self::new();
        trans.put_command(Opcode::Request).put(&key.as_u32());
        trans
    }

    /// `[Reply]`, the prefix of every broker reply.
    pub fn reply() -> Self {
        let mut trans = Self::new();
        trans.put_command(Opcode::Reply);
        trans
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// True while unread fields remain.
    pub fn has_remaining(&self) -> bool {
        self.pos < self.buf.len()
    }

    pub fn clear(&mut self) {
        self.buf.clear();
        self.pos = 0;
    }

    pub fn rewind(&mut self) {
        self.pos = 0;
    }

    pub fn cursor(&self) -> Cursor {
        Cursor(self.pos)
    }

    /// Move the read position back to a previously saved [`Cursor`].
    ///
    /// Cursors past the end of the buffer clamp to the end.
    pub fn restore(&mut self, cursor: Cursor) {
        self.pos = cursor.0.min(self.buf.len());
    }

    pub fn put_command(&mut self, opcode: Opcode) -> &mut Self {
        self.buf.push(FieldTag::Command as u8);
        self.buf.extend_from_slice(&opcode.to_wire().to_le_bytes());
        self
    }

    pub fn put<T: WireEncode + ?Sized>(&mut self, value: &T) -> &mut Self {
        self.buf.push(T::TAG as u8);
        value.encode(&mut self.buf);
        self
    }

    /// Append every unread field of `other` without decoding them.
    pub fn append_remaining(&mut self, other: &Transaction) -> &mut Self {
        self.buf.extend_from_slice(&other.buf[other.pos..]);
        self
    }

    /// Tag of the next field, or `None` at the end or on an unknown tag.
    pub fn peek_tag(&self) -> Option<FieldTag> {
        self.buf.get(self.pos).copied().and_then(FieldTag::from_wire)
    }

    /// Take the next field as a `T`.
    ///
    /// On a tag mismatch or a truncated body the cursor stays where it was.
    #[track_caller]
    pub fn get<T: WireDecode>(&mut self) -> Result<T, CodecError> {
        self.expect_tag(T::TAG)?;
        let mut reader = FieldReader::new(&self.buf[self.pos + 1..]);
        let value = T::decode(&mut reader)?;
        self.pos += 1 + reader.position();
        Ok(value)
    }

    /// Take the next `Command` field.
    ///
    /// Codes outside the known set yield [`CodecError::UnknownOpcode`] and
    /// leave the cursor in place.
    #[track_caller]
    pub fn get_command(&mut self) -> Result<Opcode, CodecError> {
        self.expect_tag(FieldTag::Command)?;
        let mut reader = FieldReader::new(&self.buf[self.pos + 1..]);
        let raw = reader.u32()? as i32;
        let opcode = Opcode::from_wire(raw).ok_or_else(|| CodecError::UnknownOpcode {
            value: raw,
            location: ErrorLocation::from(Location::caller()),
        })?;
        self.pos += 1 + reader.position();
        Ok(opcode)
    }

    #[track_caller]
    fn expect_tag(&self, expected: FieldTag) -> Result<(), CodecError> {
        let found = match self.buf.get(self.pos) {
            None => "end of transaction".to_string(),
            Some(&raw) => match FieldTag::from_wire(raw) {
                Some(tag) if tag == expected => return Ok(()),
                Some(tag) => tag.name().to_string(),
                None => format!("unknown tag {raw}"),
            },
        };
        Err(CodecError::TypeMismatch {
            expected: expected.name(),
            found,
            location: ErrorLocation::from(Location::caller()),
        })
    }
}
