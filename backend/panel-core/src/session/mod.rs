//! Connection bookkeeping for the broker.
//!
//! - [`registry`]: live connections, their negotiated role and session key
//! - [`handshake`]: the `OpenConnection` exchange that classifies a peer
//! - [`repository`]: which engine instances belong to which connection

pub mod handshake;
pub mod registry;
pub mod repository;
pub mod role;

pub use handshake::{HandshakeRequest, open_connection};
pub use registry::{ConnectionId, ConnectionRecord, ConnectionRegistry};
pub use repository::{InstanceId, InstanceRepository};
pub use role::Role;
