//! The `OpenConnection` handshake.
//!
//! ```text
//! peer   -> [Request][OpenConnection][String role][String expected server]
//! broker -> [Reply][Ok][Uint32 session key]   accepted
//! broker -> [Reply][Fail]                     rejected, connection closed
//! ```
//!
//! The role is taken on trust from the peer's own declaration; the socket is
//! a local IPC channel and nothing here authenticates the process behind it.

use crate::PANEL_SERVER_NAME;
use crate::error::ipc::IpcError;
use crate::session::role::Role;
use crate::transaction::{FrameLimits, Opcode, Transaction};

use common::{ErrorLocation, SessionKey};

use std::panic::Location;

use log::{debug, warn};
use tokio::io::{AsyncRead, AsyncWrite};

/// A parsed handshake request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    pub role: Role,
    pub expected_server: String,
}

impl HandshakeRequest {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            expected_server: PANEL_SERVER_NAME.to_string(),
        }
    }

    pub fn to_transaction(&self) -> Transaction {
        let mut trans = Transaction::new();
        trans
            .put_command(Opcode::Request)
            .put_command(Opcode::OpenConnection)
            .put(self.role.wire_name())
            .put(self.expected_server.as_str());
        trans
    }

    /// Parse the first frame of an unclassified connection.
    ///
    /// Anything other than a well formed `OpenConnection` naming a known
    /// role and this broker is rejected.
    #[track_caller]
    pub fn parse(trans: &mut Transaction) -> Result<Self, IpcError> {
        let location = ErrorLocation::from(Location::caller());
        let reject = |message: String| IpcError::Handshake { message, location };

        let marker = trans.get_command()?;
        if marker != Opcode::Request {
            return Err(reject(format!("expected Request marker, got {marker}")));
        }

        let opcode = trans.get_command()?;
        if opcode != Opcode::OpenConnection {
            return Err(reject(format!(
                "{opcode} sent before OpenConnection"
            )));
        }

        let role_name: String = trans.get()?;
        let expected_server: String = trans.get()?;

        let role = Role::from_wire_name(&role_name)
            .ok_or_else(|| reject(format!("unknown peer role '{role_name}'")))?;

        if expected_server != PANEL_SERVER_NAME {
            return Err(reject(format!(
                "peer expects server '{expected_server}', this is '{PANEL_SERVER_NAME}'"
            )));
        }

        Ok(Self {
            role,
            expected_server,
        })
    }
}

pub fn accept_reply(key: &SessionKey) -> Transaction {
    let mut trans = Transaction::reply();
    trans.put_command(Opcode::Ok).put(&key.as_u32());
    trans
}

pub fn reject_reply() -> Transaction {
    let mut trans = Transaction::reply();
    trans.put_command(Opcode::Fail);
    trans
}

/// Client side of the handshake.
///
/// Sends `OpenConnection` for `role` and returns the issued key.
pub async fn open_connection<S>(
    stream: &mut S,
    role: Role,
    limits: &FrameLimits,
) -> Result<SessionKey, IpcError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    HandshakeRequest::new(role)
        .to_transaction()
        .write_to(stream, limits)
        .await?;

    let mut reply = Transaction::read_from(stream, limits).await?;

    if reply.get_command()? != Opcode::Reply {
        return Err(IpcError::Protocol {
            message: "handshake answer does not start with Reply".to_string(),
            location: ErrorLocation::from(Location::caller()),
        });
    }

    match reply.get_command()? {
        Opcode::Ok => {
            let key: u32 = reply.get()?;
            debug!("Handshake as {} accepted", role);
            Ok(SessionKey::from_wire(key))
        }
        status => {
            warn!("Handshake as {} rejected ({})", role, status);
            Err(IpcError::Handshake {
                message: format!("broker rejected handshake as {role}"),
                location: ErrorLocation::from(Location::caller()),
            })
        }
    }
}
