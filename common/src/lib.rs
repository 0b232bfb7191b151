//! Shared primitives for the panel workspace.
//!
//! ## Architecture
//!
//! - **common** (this crate): error location tracking and the session key
//! - **models**: pure data structures exchanged over the wire
//! - **panel-core**: protocol, session and supervision logic
//! - **panel**: the broker binary wiring everything together

pub mod error;
pub mod session_key;

#[cfg(test)]
mod tests;

pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use session_key::SessionKey;
