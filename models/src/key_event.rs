use serde::{Deserialize, Serialize};

/// Modifier bits carried in [`KeyEvent::mask`].
pub mod mask {
    pub const SHIFT: u16 = 1 << 0;
    pub const CAPS_LOCK: u16 = 1 << 1;
    pub const CONTROL: u16 = 1 << 2;
    pub const ALT: u16 = 1 << 3;
    pub const META: u16 = 1 << 4;
    pub const SUPER: u16 = 1 << 5;
    pub const NUM_LOCK: u16 = 1 << 9;
    pub const RELEASE: u16 = 1 << 15;
}

/// Well known keysyms.
pub mod keysym {
    pub const BACKSPACE: u32 = 0xff08;
    pub const TAB: u32 = 0xff09;
    pub const RETURN: u32 = 0xff0d;
    pub const ESCAPE: u32 = 0xff1b;
    pub const SPACE: u32 = 0x0020;
    pub const DELETE: u32 = 0xffff;
    pub const LEFT: u32 = 0xff51;
    pub const UP: u32 = 0xff52;
    pub const RIGHT: u32 = 0xff53;
    pub const DOWN: u32 = 0xff54;
    pub const PAGE_UP: u32 = 0xff55;
    pub const PAGE_DOWN: u32 = 0xff56;

    /// Offset of the keysym block that maps 1:1 onto Unicode code points.
    pub const UNICODE_OFFSET: u32 = 0x0100_0000;
}

/// A key press or release as delivered by the client application.
///
/// `code` is an X11 style keysym, `layout` identifies the physical keyboard
/// layout the event came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    pub code: u32,
    pub mask: u16,
    pub layout: u16,
}

impl KeyEvent {
    pub fn new(code: u32, mask: u16) -> Self {
        Self {
            code,
            mask,
            layout: 0,
        }
    }

    pub fn from_char(ch: char) -> Self {
        let cp = ch as u32;
        let code = if (0x20..=0x7e).contains(&cp) || (0xa0..=0xff).contains(&cp) {
            cp
        } else {
            keysym::UNICODE_OFFSET + cp
        };
        Self::new(code, 0)
    }

    pub fn is_release(&self) -> bool {
        self.mask & mask::RELEASE != 0
    }

    pub fn is_press(&self) -> bool {
        !self.is_release()
    }

    pub fn has_modifier(&self) -> bool {
        self.mask & (mask::CONTROL | mask::ALT | mask::META | mask::SUPER) != 0
    }

    /// The character this key produces on its own, if any.
    ///
    /// Latin-1 keysyms map to themselves; the Unicode block maps onto code
    /// points. Function keys and control characters yield `None`.
    pub fn to_char(&self) -> Option<char> {
        let cp = match self.code {
            c @ 0x20..=0x7e => c,
            c @ 0xa0..=0xff => c,
            c if c > keysym::UNICODE_OFFSET && c <= keysym::UNICODE_OFFSET + 0x10_ffff => {
                c - keysym::UNICODE_OFFSET
            }
            _ => return None,
        };
        char::from_u32(cp).filter(|ch| !ch.is_control())
    }
}
