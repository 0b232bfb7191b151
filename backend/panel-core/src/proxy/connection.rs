//! One live engine-client connection to the broker.

use crate::engine::Callback;
use crate::error::proxy::ProxyError;
use crate::proxy::{ClientCallbacks, InstanceHandle, RemoteInstance};
use crate::session::{Role, open_connection};
use crate::transaction::{FrameLimits, Opcode, Transaction};

use common::{ErrorLocation, SessionKey};

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::Path;

use log::{debug, trace, warn};
use tokio::net::UnixStream;

/// Final status of a call and the results that followed it.
#[derive(Debug)]
pub struct CallReply {
    pub ok: bool,
    /// Positioned at the first result field.
    pub results: Transaction,
}

#[derive(Debug)]
pub struct ProxyConnection {
    stream: UnixStream,
    key: SessionKey,
}

impl ProxyConnection {
    /// Dial the broker and complete the handshake as an engine client.
    pub async fn open(socket_path: &Path, limits: &FrameLimits) -> Result<Self, ProxyError> {
        let mut stream = UnixStream::connect(socket_path).await.map_err(|e| {
            ProxyError::Transport {
                message: format!("cannot connect to {}: {e}", socket_path.display()),
                location: ErrorLocation::from(Location::caller()),
            }
        })?;
        let key = open_connection(&mut stream, Role::EngineClient, limits).await?;
        debug!("Proxy connected to {}", socket_path.display());
        Ok(Self { stream, key })
    }

    /// A new request frame carrying this connection's key.
    pub fn request(&self) -> Transaction {
        Transaction::request(&self.key)
    }

    /// Send `request` and read replies until the final status.
    ///
    /// Callbacks are handed to `callbacks` as they arrive and continuation
    /// queries are answered on the spot.
    pub async fn exchange(
        &mut self,
        request: &Transaction,
        limits: &FrameLimits,
        handles: &BTreeMap<InstanceHandle, RemoteInstance>,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<CallReply, ProxyError> {
        request.write_to(&mut self.stream, limits).await?;

        loop {
            let mut reply = Transaction::read_from(&mut self.stream, limits).await?;
            if reply.get_command()? != Opcode::Reply {
                return Err(protocol_error("frame does not start with Reply"));
            }

            loop {
                let opcode = reply.get_command()?;
                match opcode {
                    Opcode::Ok | Opcode::Fail => {
                        return Ok(CallReply {
                            ok: opcode == Opcode::Ok,
                            results: reply,
                        });
                    }
                    Opcode::Continue => {
                        let answer = self.answer_query(&mut reply, handles, callbacks)?;
                        answer.write_to(&mut self.stream, limits).await?;
                        break;
                    }
                    opcode if Callback::is_callback_opcode(opcode) => {
                        let (instance, callback) = Callback::decode(opcode, &mut reply)?;
                        match handle_for(handles, instance.get()) {
                            Some(handle) => callbacks.on_callback(handle, callback),
                            None => warn!("Dropping {} for unknown remote {}", opcode, instance),
                        }
                    }
                    other => {
                        return Err(protocol_error(&format!("unexpected {other} in reply")));
                    }
                }
            }
        }
    }

    fn answer_query(
        &self,
        reply: &mut Transaction,
        handles: &BTreeMap<InstanceHandle, RemoteInstance>,
        callbacks: &mut dyn ClientCallbacks,
    ) -> Result<Transaction, ProxyError> {
        let query = reply.get_command()?;
        let remote = reply.get::<u32>()?;
        let handle = handle_for(handles, remote);

        let mut answer = self.request();
        answer.put_command(query);
        match query {
            Opcode::GetSurroundingText => {
                let max_before = reply.get::<u32>()?;
                let max_after = reply.get::<u32>()?;
                let (text, cursor) = handle
                    .and_then(|handle| callbacks.surrounding_text(handle, max_before, max_after))
                    .unwrap_or_default();
                trace!("Answering surrounding text query with {} chars", text.chars().count());
                answer.put(&text).put(&cursor);
            }
            Opcode::GetSelection => {
                let text = handle
                    .and_then(|handle| callbacks.selection(handle))
                    .unwrap_or_default();
                answer.put(&text);
            }
            other => {
                return Err(protocol_error(&format!("unsupported continuation query {other}")));
            }
        }
        Ok(answer)
    }
}

fn handle_for(
    handles: &BTreeMap<InstanceHandle, RemoteInstance>,
    remote: u32,
) -> Option<InstanceHandle> {
    handles
        .iter()
        .find(|(_, instance)| instance.remote == Some(remote))
        .map(|(handle, _)| *handle)
}

#[track_caller]
fn protocol_error(message: &str) -> ProxyError {
    ProxyError::Protocol {
        message: message.to_string(),
        location: ErrorLocation::from(Location::caller()),
    }
}
