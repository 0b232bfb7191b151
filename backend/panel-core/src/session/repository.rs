//! Ownership of engine instances by connection.
//!
//! Pairs are kept sorted by `(connection, instance)` so that every instance
//! owned by one connection forms a contiguous run that can be erased in one
//! range operation.

use crate::session::registry::ConnectionId;

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(u32);

impl InstanceId {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

#[derive(Debug, Default)]
pub struct InstanceRepository {
    pairs: Vec<(ConnectionId, InstanceId)>,
}

impl InstanceRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the pair was already present.
    pub fn insert(&mut self, connection: ConnectionId, instance: InstanceId) -> bool {
        match self.pairs.binary_search(&(connection, instance)) {
            Ok(_) => false,
            Err(pos) => {
                self.pairs.insert(pos, (connection, instance));
                true
            }
        }
    }

    pub fn remove(&mut self, connection: ConnectionId, instance: InstanceId) -> bool {
        match self.pairs.binary_search(&(connection, instance)) {
            Ok(pos) => {
                self.pairs.remove(pos);
                true
            }
            Err(_) => false,
        }
    }

    /// Remove and return every instance owned by `connection`.
    pub fn remove_all(&mut self, connection: ConnectionId) -> Vec<InstanceId> {
        let range = self.range_of(connection);
        self.pairs
            .drain(range)
            .map(|(_, instance)| instance)
            .collect()
    }

    pub fn contains(&self, connection: ConnectionId, instance: InstanceId) -> bool {
        self.pairs.binary_search(&(connection, instance)).is_ok()
    }

    pub fn owner_of(&self, instance: InstanceId) -> Option<ConnectionId> {
        self.pairs
            .iter()
            .find(|(_, id)| *id == instance)
            .map(|(connection, _)| *connection)
    }

    pub fn instances_of(&self, connection: ConnectionId) -> Vec<InstanceId> {
        self.pairs[self.range_of(connection)]
            .iter()
            .map(|(_, instance)| *instance)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn range_of(&self, connection: ConnectionId) -> std::ops::Range<usize> {
        let start = self.pairs.partition_point(|(c, _)| *c < connection);
        let end = self.pairs.partition_point(|(c, _)| *c <= connection);
        start..end
    }
}
