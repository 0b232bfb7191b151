//! The broker's request dispatcher.
//!
//! # Architecture
//!
//! One [`Dispatcher`] owns every piece of broker state and runs on a single
//! task. Each accepted connection gets a reader task that does nothing but
//! cut the byte stream into frames and forward them, in order, over one
//! shared channel. The dispatcher takes events off that channel one at a
//! time, so handlers never race and nothing is locked.
//!
//! ```text
//! reader task (conn 1) ──┐
//! reader task (conn 2) ──┼──> events channel ──> Dispatcher ──> replies
//! reader task (conn n) ──┘                          │
//!                                deferred queue <───┘ (during a continuation)
//! ```
//!
//! While a handler waits for a client answer (see [`continuation`]) events
//! from every other connection are parked in the deferred queue, which is
//! drained before the channel once the handler finishes. Per-connection
//! order is therefore the order frames arrived in.

pub mod context;
pub mod continuation;
pub mod handlers;
pub mod table;

pub use continuation::{ContinuationOutcome, ContinuationState, Query};
pub use table::{Handler, HandlerEntry, HandlerTable, TableReport};

use crate::config::ConfigStore;
use crate::engine::{Callback, EngineHost};
use crate::error::codec::CodecError;
use crate::error::ipc::IpcError;
use crate::observer::PanelObserver;
use crate::session::handshake::{self, HandshakeRequest};
use crate::session::{
    ConnectionId, ConnectionRecord, ConnectionRegistry, InstanceId, InstanceRepository, Role,
};
use crate::supervisor::{HelperState, Supervisor};
use crate::transaction::socket::discard_payload;
use crate::transaction::{FrameLimits, Opcode, Transaction};

use common::{ErrorLocation, SessionKey};

use std::collections::VecDeque;
use std::future::{Future, pending};
use std::os::fd::AsRawFd;
use std::panic::Location;
use std::time::Duration;

use log::{debug, error, info, trace, warn};
use tokio::net::{UnixListener, UnixStream};
use tokio::net::unix::OwnedReadHalf;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

/// Bound of the shared inbound channel.
const EVENT_CHANNEL_CAPACITY: usize = 100;

#[derive(Debug)]
pub enum InboundKind {
    Frame(Transaction),
    /// A frame was refused before decoding; the stream is still in sync.
    Malformed(String),
    /// The reader hit end of stream, a timeout or an I/O error.
    Closed(String),
}

#[derive(Debug)]
pub struct InboundEvent {
    pub connection: ConnectionId,
    pub kind: InboundKind,
}

/// One decoded request on its way through the handlers.
#[derive(Debug)]
pub struct Request {
    pub connection: ConnectionId,
    pub role: Role,
    pub inbound: Transaction,
    pub reply: Transaction,
}

impl Request {
    pub fn ok(&mut self) -> &mut Transaction {
        self.reply.put_command(Opcode::Ok)
    }

    pub fn fail(&mut self) {
        self.reply.put_command(Opcode::Fail);
    }
}

/// What a handler asks the dispatcher to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Status and results are in the reply; go on with the next command.
    Done,
    /// Do not write a reply for this frame.
    NoReply,
    /// Arguments did not decode. The dispatcher appends `Fail` and drops
    /// the rest of the frame.
    Malformed,
    /// Reply, then close the connection.
    Close,
    /// The client went away during a continuation.
    Disconnected,
    /// Reply, then stop the broker.
    Exit,
}

enum FrameResult {
    Reply,
    NoReply,
    Close,
    Disconnected,
}

pub struct Dispatcher {
    limits: FrameLimits,
    registry: ConnectionRegistry,
    instances: InstanceRepository,
    engines: EngineHost,
    supervisor: Supervisor,
    store: ConfigStore,
    observer: Box<dyn PanelObserver>,
    table: HandlerTable,
    events_tx: mpsc::Sender<InboundEvent>,
    events_rx: mpsc::Receiver<InboundEvent>,
    deferred: VecDeque<InboundEvent>,
    /// Frames for connections other than the requester, sent after the
    /// current request finishes.
    outbox: Vec<(ConnectionId, Transaction)>,
    exit_requested: bool,
}

impl Dispatcher {
    /// Build a dispatcher with the standard handler table.
    ///
    /// # Errors
    ///
    /// Returns [`IpcError::Protocol`] if the handler table has duplicate or
    /// missing registrations.
    pub fn new(
        limits: FrameLimits,
        mut engines: EngineHost,
        supervisor: Supervisor,
        store: ConfigStore,
        observer: Box<dyn PanelObserver>,
    ) -> Result<Self, IpcError> {
        let table = handlers::standard_table();
        let report = table.validate(&handlers::required_opcodes());
        if !report.is_valid() {
            return Err(IpcError::Protocol {
                message: format!("handler table is inconsistent: {report}"),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        engines.load_factories(supervisor.catalogue().iter());

        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        Ok(Self {
            limits,
            registry: ConnectionRegistry::new(),
            instances: InstanceRepository::new(),
            engines,
            supervisor,
            store,
            observer,
            table,
            events_tx,
            events_rx,
            deferred: VecDeque::new(),
            outbox: Vec::new(),
            exit_requested: false,
        })
    }

    pub fn limits(&self) -> &FrameLimits {
        &self.limits
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn instances(&self) -> &InstanceRepository {
        &self.instances
    }

    pub fn engines(&self) -> &EngineHost {
        &self.engines
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn supervisor_mut(&mut self) -> &mut Supervisor {
        &mut self.supervisor
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Serve `listener` until shutdown resolves, a client sends `Exit`, or
    /// the listener fails.
    pub async fn run<F>(
        mut self,
        listener: UnixListener,
        mut module_changes: Option<mpsc::Receiver<()>>,
        reap_interval: Duration,
        shutdown: F,
    ) -> Result<(), IpcError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut reap = tokio::time::interval(reap_interval);
        reap.set_missed_tick_behavior(MissedTickBehavior::Delay);

        self.supervisor.auto_start();
        info!("Dispatcher running");

        while !self.exit_requested {
            if let Some(event) = self.deferred.pop_front() {
                self.handle_event(event).await;
                continue;
            }

            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        self.accept(stream);
                    }
                    Err(e) => warn!("Accept failed: {}", e),
                },
                Some(event) = self.events_rx.recv() => self.handle_event(event).await,
                Some(()) = next_change(&mut module_changes) => self.rescan_modules(),
                _ = reap.tick() => self.reap_helpers(),
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
            }
        }

        self.shutdown().await;
        Ok(())
    }

    /// Handle exactly one event, deferred events first.
    pub async fn step(&mut self) {
        let event = match self.deferred.pop_front() {
            Some(event) => event,
            None => match self.events_rx.recv().await {
                Some(event) => event,
                None => return,
            },
        };
        self.handle_event(event).await;
    }

    /// Register a freshly accepted stream as an unclassified connection.
    pub fn accept(&mut self, stream: UnixStream) -> ConnectionId {
        let raw_fd = stream.as_raw_fd();
        let id = self.registry.allocate_id();
        let (read_half, write_half) = stream.into_split();
        let reader = tokio::spawn(read_loop(
            id,
            read_half,
            self.limits,
            self.events_tx.clone(),
        ));
        self.registry
            .insert(id, ConnectionRecord::new(write_half, reader, raw_fd));
        info!("Accepted {} (fd {})", id, raw_fd);
        id
    }

    async fn handle_event(&mut self, event: InboundEvent) {
        match event.kind {
            InboundKind::Closed(reason) => {
                debug!("{} closed: {}", event.connection, reason);
                self.teardown(event.connection);
            }
            InboundKind::Malformed(reason) => {
                self.reject_malformed(event.connection, &reason).await
            }
            InboundKind::Frame(trans) => self.handle_frame(event.connection, trans).await,
        }
    }

    /// Fail a frame the reader could not take in. Before the handshake that
    /// also ends the connection.
    async fn reject_malformed(&mut self, connection: ConnectionId, reason: &str) {
        let Some(record) = self.registry.get(connection) else {
            return;
        };
        warn!("Malformed frame from {}: {}", connection, reason);
        let classified = record.is_classified();
        self.send_or_teardown(connection, &handshake::reject_reply()).await;
        if !classified {
            self.teardown(connection);
        }
    }

    async fn handle_frame(&mut self, connection: ConnectionId, mut inbound: Transaction) {
        let Some(record) = self.registry.get(connection) else {
            trace!("Dropping frame for closed {}", connection);
            return;
        };

        if !record.is_classified() {
            self.handshake(connection, inbound).await;
            return;
        }

        let role = record.role();
        let authorized = inbound.get_command().is_ok_and(|op| op == Opcode::Request)
            && inbound
                .get::<u32>()
                .is_ok_and(|key| record.key_matches(key));
        if !authorized {
            warn!("Rejected request from {}: bad marker or session key", connection);
            self.send_or_teardown(connection, &handshake::reject_reply())
                .await;
            return;
        }

        let mut request = Request {
            connection,
            role,
            inbound,
            reply: Transaction::reply(),
        };
        let result = self.dispatch(&mut request).await;
        self.flush_outbox().await;

        match result {
            FrameResult::Reply => self.send_or_teardown(connection, &request.reply).await,
            FrameResult::NoReply => {}
            FrameResult::Close => {
                self.send_or_teardown(connection, &request.reply).await;
                self.teardown(connection);
            }
            FrameResult::Disconnected => {
                warn!("{} went away mid-request, failing it", connection);
                self.teardown(connection);
            }
        }
    }

    /// Run every command of a request through its handler.
    async fn dispatch(&mut self, request: &mut Request) -> FrameResult {
        let mut result = FrameResult::Reply;

        while request.inbound.has_remaining() {
            let opcode = match request.inbound.get_command() {
                Ok(opcode) => opcode,
                Err(e) => {
                    warn!("{}: undecodable command: {}", request.connection, e);
                    request.fail();
                    break;
                }
            };

            let Some(entry) = self.table.get(opcode).copied() else {
                warn!("{}: no handler for {}", request.connection, opcode);
                request.fail();
                break;
            };

            if !entry.permits(request.role) {
                warn!(
                    "{}: {} not permitted for {}",
                    request.connection, opcode, request.role
                );
                request.fail();
                break;
            }

            trace!("{}: dispatching {}", request.connection, opcode);
            let outcome = match entry.handler {
                Handler::Sync(handler) => handler(self, request),
                Handler::Async(handler) => handler(self, request).await,
            };

            match outcome {
                HandlerOutcome::Done => {}
                HandlerOutcome::NoReply => result = FrameResult::NoReply,
                HandlerOutcome::Malformed => {
                    warn!("{}: malformed arguments for {}", request.connection, opcode);
                    request.fail();
                    break;
                }
                HandlerOutcome::Close => {
                    result = FrameResult::Close;
                    break;
                }
                HandlerOutcome::Disconnected => return FrameResult::Disconnected,
                HandlerOutcome::Exit => {
                    info!("{} requested broker exit", request.connection);
                    self.exit_requested = true;
                    break;
                }
            }
        }

        result
    }

    async fn handshake(&mut self, connection: ConnectionId, mut inbound: Transaction) {
        let parsed = HandshakeRequest::parse(&mut inbound);
        let role = match parsed {
            Ok(request) => request.role,
            Err(e) => {
                warn!("Rejected handshake on {}: {}", connection, e);
                // The connection is closed either way.
                let _ = self
                    .registry
                    .send(connection, &handshake::reject_reply(), &self.limits)
                    .await;
                self.teardown(connection);
                return;
            }
        };

        let key = SessionKey::generate();
        let reply = handshake::accept_reply(&key);
        if let Err(e) = self.registry.classify(connection, role, key) {
            error!("Handshake bookkeeping failed for {}: {}", connection, e);
            self.teardown(connection);
            return;
        }
        self.send_or_teardown(connection, &reply).await;
    }

    async fn send_or_teardown(&mut self, connection: ConnectionId, trans: &Transaction) {
        if let Err(e) = self.registry.send(connection, trans, &self.limits).await {
            warn!("Write to {} failed: {}", connection, e);
            self.teardown(connection);
        }
    }

    async fn flush_outbox(&mut self) {
        for (connection, trans) in std::mem::take(&mut self.outbox) {
            self.send_or_teardown(connection, &trans).await;
        }
    }

    /// Queue a frame for a connection other than the one being served.
    pub(crate) fn push_to(&mut self, connection: ConnectionId, trans: Transaction) {
        self.outbox.push((connection, trans));
    }

    /// Forget a connection: its instances first, then its helper
    /// registrations, then the record itself.
    pub(crate) fn teardown(&mut self, connection: ConnectionId) {
        if !self.registry.contains(connection) {
            return;
        }

        let destroyed = self.instances.remove_all(connection);
        for instance in &destroyed {
            self.engines.delete_instance(*instance);
        }

        for uuid in self.supervisor.on_connection_closed(connection) {
            self.observer.on_ise_state_changed(&uuid, HelperState::Stopped);
        }

        let role = self.registry.remove(connection);
        self.deferred.retain(|event| event.connection != connection);
        self.outbox.retain(|(target, _)| *target != connection);

        info!(
            "Closed {} ({}), destroyed {} instances",
            connection,
            role.map(|role| role.wire_name()).unwrap_or("unknown"),
            destroyed.len()
        );
    }

    /// Apply a callback an engine emitted while serving `instance`.
    ///
    /// Client-facing callbacks are appended to `reply`; helper control is
    /// carried out by the broker itself.
    pub(crate) fn route_callback(
        &mut self,
        instance: InstanceId,
        callback: Callback,
        reply: &mut Transaction,
    ) {
        match &callback {
            Callback::ShowLookupTable => self.observer.on_show_candidate_table(),
            Callback::UpdateLookupTable(table) => self.observer.on_update_lookup_table(table),
            Callback::StartHelper(uuid) => {
                if let Err(e) = self.supervisor.start_helper(uuid) {
                    warn!("{} asked to start helper {}: {}", instance, uuid, e);
                }
                return;
            }
            Callback::StopHelper(uuid) => {
                self.request_helper_stop(uuid);
                return;
            }
            Callback::SendHelperEvent { helper, .. } => {
                match self.supervisor.connection_of(helper) {
                    Some(connection) => {
                        let mut trans = Transaction::reply();
                        callback.encode(instance, &mut trans);
                        self.push_to(connection, trans);
                    }
                    None => warn!(
                        "{} sent an event to helper {} which is not running",
                        instance, helper
                    ),
                }
                return;
            }
            _ => {}
        }
        callback.encode(instance, reply);
    }

    /// Ask a running helper to terminate itself.
    pub(crate) fn request_helper_stop(&mut self, uuid: &str) -> bool {
        match self.supervisor.stop_helper(uuid) {
            Ok(connection) => {
                let mut trans = Transaction::reply();
                trans.put_command(Opcode::TerminateHelper).put(uuid);
                self.push_to(connection, trans);
                info!("Asked helper {} on {} to terminate", uuid, connection);
                true
            }
            Err(e) => {
                warn!("Cannot stop helper {}: {}", uuid, e);
                false
            }
        }
    }

    pub(crate) fn rescan_modules(&mut self) {
        match self.supervisor.rescan() {
            Ok(true) => {
                info!("Module set changed, reloading engine factories");
                self.reload_factories();
            }
            Ok(false) => debug!("Module rescan found no changes"),
            Err(e) => warn!("Module rescan failed: {}", e),
        }
    }

    pub(crate) fn reload_factories(&mut self) {
        self.engines.load_factories(self.supervisor.catalogue().iter());
    }

    fn reap_helpers(&mut self) {
        for record in self.supervisor.reap() {
            debug!(
                "Reaped helper {} after {:?} (status {:?})",
                record.uuid, record.ran_for, record.status
            );
        }
    }

    async fn shutdown(&mut self) {
        info!("Dispatcher stopping");
        for connection in self.registry.ids() {
            self.teardown(connection);
        }
        self.supervisor.shutdown().await;
        if let Err(e) = self.store.flush() {
            warn!("Config store not flushed on shutdown: {}", e);
        }
    }
}

async fn next_change(changes: &mut Option<mpsc::Receiver<()>>) -> Option<()> {
    match changes {
        Some(rx) => rx.recv().await,
        None => pending().await,
    }
}

/// Frame the byte stream of one connection into events until it fails.
///
/// An oversized frame is reported as malformed and its payload skipped, so
/// the connection survives it.
async fn read_loop(
    connection: ConnectionId,
    mut read_half: OwnedReadHalf,
    limits: FrameLimits,
    events: mpsc::Sender<InboundEvent>,
) {
    loop {
        let kind = match Transaction::read_when_ready(&mut read_half, &limits).await {
            Ok(trans) => InboundKind::Frame(trans),
            Err(CodecError::FrameTooLarge { length, limit, .. }) => {
                let reason = format!("frame of {length} bytes exceeds limit of {limit}");
                let malformed = InboundEvent {
                    connection,
                    kind: InboundKind::Malformed(reason),
                };
                if events.send(malformed).await.is_err() {
                    break;
                }
                match discard_payload(&mut read_half, length, &limits).await {
                    Ok(()) => continue,
                    Err(e) => InboundKind::Closed(e.to_string()),
                }
            }
            Err(e) => InboundKind::Closed(e.to_string()),
        };
        let closed = matches!(kind, InboundKind::Closed(_));
        if events.send(InboundEvent { connection, kind }).await.is_err() || closed {
            break;
        }
    }
}
