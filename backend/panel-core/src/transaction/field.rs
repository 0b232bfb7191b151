//! Typed field encodings.
//!
//! Every field starts with a one byte [`FieldTag`]. Integers are little
//! endian; variable sized values carry a `u32` length or element count in
//! front of their body.

use crate::error::codec::CodecError;
use crate::transaction::Transaction;

use common::ErrorLocation;
use models::{Attribute, AttributeKind, Candidate, KeyEvent, LookupTable, Property};

use std::panic::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldTag {
    Command = 1,
    Uint32 = 2,
    String = 3,
    WideString = 4,
    Raw = 5,
    Attributes = 6,
    LookupTable = 7,
    Transaction = 8,
    KeyEvent = 9,
    StringList = 10,
    Uint32List = 11,
    Property = 12,
    PropertyList = 13,
}

impl FieldTag {
    pub fn from_wire(value: u8) -> Option<Self> {
        Some(match value {
            1 => FieldTag::Command,
            2 => FieldTag::Uint32,
            3 => FieldTag::String,
            4 => FieldTag::WideString,
            5 => FieldTag::Raw,
            6 => FieldTag::Attributes,
            7 => FieldTag::LookupTable,
            8 => FieldTag::Transaction,
            9 => FieldTag::KeyEvent,
            10 => FieldTag::StringList,
            11 => FieldTag::Uint32List,
            12 => FieldTag::Property,
            13 => FieldTag::PropertyList,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldTag::Command => "command",
            FieldTag::Uint32 => "uint32",
            FieldTag::String => "string",
            FieldTag::WideString => "wide string",
            FieldTag::Raw => "raw",
            FieldTag::Attributes => "attributes",
            FieldTag::LookupTable => "lookup table",
            FieldTag::Transaction => "transaction",
            FieldTag::KeyEvent => "key event",
            FieldTag::StringList => "string list",
            FieldTag::Uint32List => "uint32 list",
            FieldTag::Property => "property",
            FieldTag::PropertyList => "property list",
        }
    }
}

/// A string sent as UTF-32 code points.
///
/// Preedit, aux and commit strings travel in this form so that attribute
/// offsets and caret positions count characters on both ends.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WideString(pub String);

impl WideString {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }

    pub fn char_len(&self) -> usize {
        self.0.chars().count()
    }
}

impl From<&str> for WideString {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Bounds checked view over a field body.
pub struct FieldReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> FieldReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    #[track_caller]
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        if len > self.remaining() {
            return Err(CodecError::Malformed {
                message: format!(
                    "field needs {len} bytes but only {} remain",
                    self.remaining()
                ),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    #[track_caller]
    pub fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    #[track_caller]
    pub fn u16(&mut self) -> Result<u16, CodecError> {
        let bytes = self.take(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    #[track_caller]
    pub fn u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read an element count and make sure the body can possibly hold that
    /// many elements of at least `min_size` bytes each.
    #[track_caller]
    pub fn count(&mut self, min_size: usize) -> Result<usize, CodecError> {
        let count = self.u32()? as usize;
        if count.saturating_mul(min_size.max(1)) > self.remaining() {
            return Err(CodecError::Malformed {
                message: format!("element count {count} exceeds remaining field data"),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(count)
    }

    #[track_caller]
    pub fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    #[track_caller]
    pub fn string(&mut self) -> Result<String, CodecError> {
        let bytes = self.bytes()?;
        String::from_utf8(bytes.to_vec()).map_err(|e| CodecError::Malformed {
            message: format!("string is not valid UTF-8: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })
    }
}

fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

fn put_len(out: &mut Vec<u8>, len: usize) {
    // Frames are capped well below u32::MAX, so lengths always fit.
    put_u32(out, len as u32);
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_len(out, bytes.len());
    out.extend_from_slice(bytes);
}

/// A value that can be appended to a [`Transaction`].
pub trait WireEncode {
    const TAG: FieldTag;

    fn encode(&self, out: &mut Vec<u8>);
}

/// A value that can be taken out of a [`Transaction`].
pub trait WireDecode: Sized {
    const TAG: FieldTag;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError>;
}

impl WireEncode for u32 {
    const TAG: FieldTag = FieldTag::Uint32;

    fn encode(&self, out: &mut Vec<u8>) {
        put_u32(out, *self);
    }
}

impl WireDecode for u32 {
    const TAG: FieldTag = FieldTag::Uint32;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        reader.u32()
    }
}

impl WireEncode for str {
    const TAG: FieldTag = FieldTag::String;

    fn encode(&self, out: &mut Vec<u8>) {
        put_bytes(out, self.as_bytes());
    }
}

impl WireEncode for String {
    const TAG: FieldTag = FieldTag::String;

    fn encode(&self, out: &mut Vec<u8>) {
        self.as_str().encode(out);
    }
}

impl WireDecode for String {
    const TAG: FieldTag = FieldTag::String;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        reader.string()
    }
}

impl WireEncode for WideString {
    const TAG: FieldTag = FieldTag::WideString;

    fn encode(&self, out: &mut Vec<u8>) {
        put_len(out, self.char_len());
        for ch in self.0.chars() {
            put_u32(out, ch as u32);
        }
    }
}

impl WireDecode for WideString {
    const TAG: FieldTag = FieldTag::WideString;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        let count = reader.count(4)?;
        let mut text = String::with_capacity(count);
        for _ in 0..count {
            let cp = reader.u32()?;
            let ch = char::from_u32(cp).ok_or_else(|| CodecError::Malformed {
                message: format!("invalid code point {cp:#x} in wide string"),
                location: ErrorLocation::from(Location::caller()),
            })?;
            text.push(ch);
        }
        Ok(WideString(text))
    }
}

impl WireEncode for [u8] {
    const TAG: FieldTag = FieldTag::Raw;

    fn encode(&self, out: &mut Vec<u8>) {
        put_bytes(out, self);
    }
}

impl WireEncode for Vec<u8> {
    const TAG: FieldTag = FieldTag::Raw;

    fn encode(&self, out: &mut Vec<u8>) {
        self.as_slice().encode(out);
    }
}

impl WireDecode for Vec<u8> {
    const TAG: FieldTag = FieldTag::Raw;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(reader.bytes()?.to_vec())
    }
}

fn encode_attribute_body(attributes: &[Attribute], out: &mut Vec<u8>) {
    put_len(out, attributes.len());
    for attribute in attributes {
        put_u32(out, attribute.kind.to_wire());
        put_u32(out, attribute.value);
        put_u32(out, attribute.start);
        put_u32(out, attribute.length);
    }
}

fn decode_attribute_body(reader: &mut FieldReader<'_>) -> Result<Vec<Attribute>, CodecError> {
    let count = reader.count(16)?;
    let mut attributes = Vec::with_capacity(count);
    for _ in 0..count {
        let kind_value = reader.u32()?;
        let kind = AttributeKind::from_wire(kind_value).ok_or_else(|| CodecError::Malformed {
            message: format!("unknown attribute kind {kind_value}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        attributes.push(Attribute {
            kind,
            value: reader.u32()?,
            start: reader.u32()?,
            length: reader.u32()?,
        });
    }
    Ok(attributes)
}

impl WireEncode for Vec<Attribute> {
    const TAG: FieldTag = FieldTag::Attributes;

    fn encode(&self, out: &mut Vec<u8>) {
        encode_attribute_body(self, out);
    }
}

impl WireDecode for Vec<Attribute> {
    const TAG: FieldTag = FieldTag::Attributes;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        decode_attribute_body(reader)
    }
}

impl WireEncode for LookupTable {
    const TAG: FieldTag = FieldTag::LookupTable;

    fn encode(&self, out: &mut Vec<u8>) {
        put_u32(out, self.page_size);
        put_u32(out, self.page_start);
        put_u32(out, self.cursor);
        put_u32(out, u32::from(self.cursor_visible));
        put_len(out, self.candidates.len());
        for candidate in &self.candidates {
            candidate.text.encode(out);
            encode_attribute_body(&candidate.attributes, out);
        }
        put_len(out, self.labels.len());
        for label in &self.labels {
            label.encode(out);
        }
    }
}

impl WireDecode for LookupTable {
    const TAG: FieldTag = FieldTag::LookupTable;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        let page_size = reader.u32()?;
        let page_start = reader.u32()?;
        let cursor = reader.u32()?;
        let cursor_visible = reader.u32()? != 0;

        let count = reader.count(8)?;
        let mut candidates = Vec::with_capacity(count);
        for _ in 0..count {
            let text = reader.string()?;
            let attributes = decode_attribute_body(reader)?;
            candidates.push(Candidate { text, attributes });
        }

        let count = reader.count(4)?;
        let mut labels = Vec::with_capacity(count);
        for _ in 0..count {
            labels.push(reader.string()?);
        }

        Ok(LookupTable {
            page_size: page_size.max(1),
            page_start,
            cursor,
            cursor_visible,
            candidates,
            labels,
        })
    }
}

impl WireEncode for Transaction {
    const TAG: FieldTag = FieldTag::Transaction;

    fn encode(&self, out: &mut Vec<u8>) {
        put_bytes(out, self.as_bytes());
    }
}

impl WireDecode for Transaction {
    const TAG: FieldTag = FieldTag::Transaction;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(Transaction::from_bytes(reader.bytes()?.to_vec()))
    }
}

impl WireEncode for KeyEvent {
    const TAG: FieldTag = FieldTag::KeyEvent;

    fn encode(&self, out: &mut Vec<u8>) {
        put_u32(out, self.code);
        out.extend_from_slice(&self.mask.to_le_bytes());
        out.extend_from_slice(&self.layout.to_le_bytes());
    }
}

impl WireDecode for KeyEvent {
    const TAG: FieldTag = FieldTag::KeyEvent;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        Ok(KeyEvent {
            code: reader.u32()?,
            mask: reader.u16()?,
            layout: reader.u16()?,
        })
    }
}

impl WireEncode for Vec<String> {
    const TAG: FieldTag = FieldTag::StringList;

    fn encode(&self, out: &mut Vec<u8>) {
        put_len(out, self.len());
        for item in self {
            item.encode(out);
        }
    }
}

impl WireDecode for Vec<String> {
    const TAG: FieldTag = FieldTag::StringList;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        let count = reader.count(4)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(reader.string()?);
        }
        Ok(items)
    }
}

impl WireEncode for Vec<u32> {
    const TAG: FieldTag = FieldTag::Uint32List;

    fn encode(&self, out: &mut Vec<u8>) {
        put_len(out, self.len());
        for item in self {
            put_u32(out, *item);
        }
    }
}

impl WireDecode for Vec<u32> {
    const TAG: FieldTag = FieldTag::Uint32List;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        let count = reader.count(4)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(reader.u32()?);
        }
        Ok(items)
    }
}

const PROPERTY_VISIBLE: u32 = 1;
const PROPERTY_ACTIVE: u32 = 2;

fn encode_property_body(property: &Property, out: &mut Vec<u8>) {
    property.key.encode(out);
    property.label.encode(out);
    property.icon.encode(out);
    property.tip.encode(out);
    let mut flags = 0;
    if property.visible {
        flags |= PROPERTY_VISIBLE;
    }
    if property.active {
        flags |= PROPERTY_ACTIVE;
    }
    put_u32(out, flags);
}

fn decode_property_body(reader: &mut FieldReader<'_>) -> Result<Property, CodecError> {
    let key = reader.string()?;
    let label = reader.string()?;
    let icon = reader.string()?;
    let tip = reader.string()?;
    let flags = reader.u32()?;
    Ok(Property {
        key,
        label,
        icon,
        tip,
        visible: flags & PROPERTY_VISIBLE != 0,
        active: flags & PROPERTY_ACTIVE != 0,
    })
}

impl WireEncode for Property {
    const TAG: FieldTag = FieldTag::Property;

    fn encode(&self, out: &mut Vec<u8>) {
        encode_property_body(self, out);
    }
}

impl WireDecode for Property {
    const TAG: FieldTag = FieldTag::Property;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        decode_property_body(reader)
    }
}

impl WireEncode for Vec<Property> {
    const TAG: FieldTag = FieldTag::PropertyList;

    fn encode(&self, out: &mut Vec<u8>) {
        put_len(out, self.len());
        for property in self {
            encode_property_body(property, out);
        }
    }
}

impl WireDecode for Vec<Property> {
    const TAG: FieldTag = FieldTag::PropertyList;

    fn decode(reader: &mut FieldReader<'_>) -> Result<Self, CodecError> {
        let count = reader.count(20)?;
        let mut items = Vec::with_capacity(count);
        for _ in 0..count {
            items.push(decode_property_body(reader)?);
        }
        Ok(items)
    }
}
