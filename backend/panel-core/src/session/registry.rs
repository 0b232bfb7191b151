//! Live connection table.
//!
//! Owned by the dispatcher task, so it is never shared and never locked.

use crate::error::codec::CodecError;
use crate::error::ipc::IpcError;
use crate::session::role::Role;
use crate::transaction::{FrameLimits, Transaction};

use common::{ErrorLocation, SessionKey};

use std::collections::BTreeMap;
use std::fmt;
use std::panic::Location;

use log::{debug, info};
use tokio::net::unix::OwnedWriteHalf;
use tokio::task::JoinHandle;

/// Identity of one accepted connection.
///
/// Allocated from a counter and never reused while the broker runs, unlike
/// the descriptor number of the underlying socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn#{}", self.0)
    }
}

pub struct ConnectionRecord {
    role: Role,
    session_key: Option<SessionKey>,
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
    raw_fd: i32,
}

impl ConnectionRecord {
    pub fn new(writer: OwnedWriteHalf, reader: JoinHandle<()>, raw_fd: i32) -> Self {
        Self {
            role: Role::Unclassified,
            session_key: None,
            writer,
            reader,
            raw_fd,
        }
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn raw_fd(&self) -> i32 {
        self.raw_fd
    }

    pub fn is_classified(&self) -> bool {
        self.role != Role::Unclassified
    }

    /// True only for a classified connection presenting its own key.
    pub fn key_matches(&self, presented: u32) -> bool {
        self.session_key
            .as_ref()
            .is_some_and(|key| key.matches(presented))
    }
}

impl Drop for ConnectionRecord {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

#[derive(Default)]
pub struct ConnectionRegistry {
    next_id: u64,
    connections: BTreeMap<ConnectionId, ConnectionRecord>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_id(&mut self) -> ConnectionId {
        self.next_id += 1;
        ConnectionId(self.next_id)
    }

    pub fn insert(&mut self, id: ConnectionId, record: ConnectionRecord) {
        debug!("Registered {} (fd {})", id, record.raw_fd);
        self.connections.insert(id, record);
    }

    /// Record the outcome of a successful handshake.
    #[track_caller]
    pub fn classify(
        &mut self,
        id: ConnectionId,
        role: Role,
        key: SessionKey,
    ) -> Result<(), IpcError> {
        let record = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| IpcError::UnknownConnection {
                message: format!("cannot classify {id}: not registered"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        if record.is_classified() {
            return Err(IpcError::Handshake {
                message: format!("{id} is already classified as {}", record.role),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        info!("{} classified as {}", id, role);
        record.role = role;
        record.session_key = Some(key);
        Ok(())
    }

    pub fn get(&self, id: ConnectionId) -> Option<&ConnectionRecord> {
        self.connections.get(&id)
    }

    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Erase a connection. Its reader task is aborted and the write half
    /// is closed when the record drops.
    pub fn remove(&mut self, id: ConnectionId) -> Option<Role> {
        let record = self.connections.remove(&id)?;
        debug!("Unregistered {} (fd {})", id, record.raw_fd);
        Some(record.role)
    }

    pub fn ids(&self) -> Vec<ConnectionId> {
        self.connections.keys().copied().collect()
    }

    pub fn ids_with_role(&self, role: Role) -> Vec<ConnectionId> {
        self.connections
            .iter()
            .filter(|(_, record)| record.role == role)
            .map(|(id, _)| *id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Write one frame to a connection.
    pub async fn send(
        &mut self,
        id: ConnectionId,
        trans: &Transaction,
        limits: &FrameLimits,
    ) -> Result<(), CodecError> {
        let record = self
            .connections
            .get_mut(&id)
            .ok_or_else(|| CodecError::Closed {
                message: format!("{id} is no longer registered"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        trans.write_to(&mut record.writer, limits).await
    }
}
