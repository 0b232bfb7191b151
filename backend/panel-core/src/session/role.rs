use std::fmt;

/// What kind of peer sits on the other end of a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Accepted but has not completed the handshake yet.
    Unclassified,
    EngineClient,
    ConfigClient,
    HelperManagerClient,
}

impl Role {
    pub const CLASSIFIED: [Role; 3] = [
        Role::EngineClient,
        Role::ConfigClient,
        Role::HelperManagerClient,
    ];

    pub fn wire_name(self) -> &'static str {
        match self {
            Role::Unclassified => "unclassified",
            Role::EngineClient => "engine-client",
            Role::ConfigClient => "config-client",
            Role::HelperManagerClient => "helper-manager",
        }
    }

    /// Resolve a role name sent during the handshake.
    ///
    /// `Unclassified` is never a valid answer.
    pub fn from_wire_name(name: &str) -> Option<Role> {
        Role::CLASSIFIED
            .into_iter()
            .find(|role| role.wire_name() == name)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}
