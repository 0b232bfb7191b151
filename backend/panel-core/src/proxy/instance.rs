use std::fmt;

/// Local name for a remote engine instance.
///
/// Handles stay valid across reconnects; only the remote id behind them
/// changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceHandle(u32);

impl InstanceHandle {
    pub fn new(value: u32) -> Self {
        Self(value)
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for InstanceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "handle#{}", self.0)
    }
}

/// What the proxy needs to recreate an instance after a reconnect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteInstance {
    pub uuid: String,
    pub encoding: String,
    /// `None` after a reconnect failed to recreate the instance.
    pub remote: Option<u32>,
}
