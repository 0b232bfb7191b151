//! Per-connection session key with redacted Debug output.

use crate::{ErrorLocation, RedactError};

use std::fmt;
use std::panic::Location;

use serde::ser::Error;
use zeroize::Zeroize;

/// The 32-bit key issued to a connection at handshake time.
///
/// Every request after the handshake must carry this value. It never shows
/// up in logs and is wiped from memory when dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionKey {
    inner: u32,
}

impl SessionKey {
    /// Draw a fresh, non-zero key.
    pub fn generate() -> Self {
        loop {
            let value: u32 = rand::random();
            if value != 0 {
                return Self { inner: value };
            }
        }
    }

    /// Wrap a key received over the wire.
    pub fn from_wire(value: u32) -> Self {
        Self { inner: value }
    }

    /// Get the raw value for transmission.
    ///
    /// # Security Note
    /// Only call this when actually putting the key into a transaction.
    #[inline]
    pub fn as_u32(&self) -> u32 {
        self.inner
    }

    /// Check a key presented by a peer.
    #[inline]
    pub fn matches(&self, presented: u32) -> bool {
        self.inner == presented
    }
}

impl fmt::Debug for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionKey([REDACTED])")
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED SESSION KEY]")
    }
}

impl Drop for SessionKey {
    fn drop(&mut self) {
        self.inner.zeroize();
    }
}

// Keys only travel inside transactions, never through serde.
impl serde::Serialize for SessionKey {
    fn serialize<S>(&self, _serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        Err(S::Error::custom(RedactError::SecretSerialization {
            type_name: "SessionKey",
            location: ErrorLocation::from(Location::caller()),
        }))
    }
}
