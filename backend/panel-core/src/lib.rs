//! Core of the input-method panel broker.
//!
//! ## Architecture
//!
//! - [`transaction`]: tagged-field codec and socket framing
//! - [`session`]: connection registry, handshake, instance ownership
//! - [`dispatch`]: the single-task dispatcher, handlers and continuations
//! - [`engine`]: in-process keyboard engines
//! - [`supervisor`]: ISE catalogue and helper processes
//! - [`proxy`]: client-side access to a remote broker's engines
//! - [`server`]: binding and startup

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod observer;
pub mod proxy;
pub mod server;
pub mod session;
pub mod supervisor;
pub mod transaction;

#[cfg(test)]
mod tests;

/// Name a client must expect the broker to announce in the handshake.
pub const PANEL_SERVER_NAME: &str = "panel";
pub const PANEL_DIR_NAME: &str = "panel";

pub const DEFAULT_SOCKET_NAME: &str = const_format::concatcp!(PANEL_SERVER_NAME, ".sock");
pub const DEFAULT_SOCKET_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_MAX_FRAME_LEN: u32 = 16 * 1024 * 1024;

pub const CONFIG_FILE_NAME: &str = const_format::concatcp!(PANEL_SERVER_NAME, ".json");
/// Extension of module manifests in the module directories.
pub const MANIFEST_EXTENSION: &str = "ise";

pub const CONFIG_DIR_ENV: &str = "PANEL_CONFIG_DIR";
pub const SOCKET_ADDRESS_ENV: &str = "PANEL_SOCKET_ADDRESS";
pub const SOCKET_TIMEOUT_ENV: &str = "PANEL_SOCKET_TIMEOUT";
