use serde::{Deserialize, Serialize};

/// What an attribute changes about the covered text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    None,
    Decorate,
    Foreground,
    Background,
}

impl AttributeKind {
    pub fn to_wire(self) -> u32 {
        match self {
            AttributeKind::None => 0,
            AttributeKind::Decorate => 1,
            AttributeKind::Foreground => 2,
            AttributeKind::Background => 3,
        }
    }

    pub fn from_wire(value: u32) -> Option<Self> {
        match value {
            0 => Some(AttributeKind::None),
            1 => Some(AttributeKind::Decorate),
            2 => Some(AttributeKind::Foreground),
            3 => Some(AttributeKind::Background),
            _ => None,
        }
    }
}

/// Decoration values for [`AttributeKind::Decorate`].
pub mod decoration {
    pub const UNDERLINE: u32 = 1;
    pub const HIGHLIGHT: u32 = 2;
    pub const REVERSE: u32 = 4;
}

/// A styling span over a preedit, aux or candidate string.
///
/// `start` and `length` count characters, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub kind: AttributeKind,
    pub value: u32,
    pub start: u32,
    pub length: u32,
}

impl Attribute {
    pub fn new(kind: AttributeKind, value: u32, start: u32, length: u32) -> Self {
        Self {
            kind,
            value,
            start,
            length,
        }
    }

    pub fn underline(start: u32, length: u32) -> Self {
        Self::new(AttributeKind::Decorate, decoration::UNDERLINE, start, length)
    }
}
