//! Request handlers, one per opcode.
//!
//! A handler decodes its arguments from `request.inbound`, acts, and appends
//! `[Ok][results…]` or `[Fail]` to `request.reply`. Argument decode
//! failures return [`HandlerOutcome::Malformed`] and leave the status to the
//! dispatcher.

pub mod config;
pub mod engine;
pub mod helper;

use crate::dispatch::context::DispatchContext;
use crate::dispatch::{Dispatcher, HandlerOutcome, HandlerTable, Request};
use crate::engine::{Callback, EngineContext, EngineInstance};
use crate::session::{InstanceId, Role};
use crate::transaction::Opcode;

use futures_util::future::BoxFuture;
use log::warn;

pub(crate) const ENGINE: &[Role] = &[Role::EngineClient];
pub(crate) const CONFIG: &[Role] = &[Role::ConfigClient];
pub(crate) const HELPER_MANAGER: &[Role] = &[Role::HelperManagerClient];
pub(crate) const CATALOGUE_READERS: &[Role] = &[Role::EngineClient, Role::HelperManagerClient];
pub(crate) const ANY_CLASSIFIED: &[Role] = &Role::CLASSIFIED;

/// Every opcode a client may send, which is every opcode except framing
/// markers, the handshake and broker to client callbacks.
pub fn required_opcodes() -> Vec<Opcode> {
    Opcode::ALL
        .iter()
        .copied()
        .filter(|opcode| {
            !matches!(
                opcode,
                Opcode::Request
                    | Opcode::Reply
                    | Opcode::Ok
                    | Opcode::Fail
                    | Opcode::Continue
                    | Opcode::OpenConnection
                    | Opcode::GetSurroundingText
                    | Opcode::GetSelection
            ) && !Callback::is_callback_opcode(*opcode)
        })
        .collect()
}

pub fn standard_table() -> HandlerTable {
    let mut table = HandlerTable::new();
    table.sync(Opcode::CloseConnection, ANY_CLASSIFIED, close_connection);
    table.sync(Opcode::Exit, ANY_CLASSIFIED, exit);
    engine::register(&mut table);
    config::register(&mut table);
    helper::register(&mut table);
    table
}

fn close_connection(_dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    request.ok();
    HandlerOutcome::Close
}

fn exit(_dispatcher: &mut Dispatcher, request: &mut Request) -> HandlerOutcome {
    request.ok();
    HandlerOutcome::Exit
}

/// Read the leading `Uint32` instance id shared by all instance requests.
pub(crate) fn instance_arg(request: &mut Request) -> Option<InstanceId> {
    request.inbound.get::<u32>().ok().map(InstanceId::new)
}

/// Call into one instance owned by the requester and append `Ok` or `Fail`
/// depending on what `call` returns.
pub(crate) async fn drive<F>(
    dispatcher: &mut Dispatcher,
    request: &mut Request,
    instance: InstanceId,
    call: F,
) -> HandlerOutcome
where
    F: for<'c> FnOnce(&'c mut dyn EngineInstance, &'c mut dyn EngineContext) -> BoxFuture<'c, bool>
        + Send,
{
    match drive_with(dispatcher, request, instance, call).await {
        Ok(true) => {
            request.ok();
            HandlerOutcome::Done
        }
        Ok(false) => {
            request.fail();
            HandlerOutcome::Done
        }
        Err(outcome) => outcome,
    }
}

/// Call into one instance owned by the requester and hand back what `call`
/// produced, leaving the status to the caller.
///
/// The instance is taken out of the engine host for the duration of the
/// call so the context can borrow the rest of the dispatcher. `Err` carries
/// the outcome when the call could not happen (status already appended) or
/// the client went away during it.
pub(crate) async fn drive_with<F, T>(
    dispatcher: &mut Dispatcher,
    request: &mut Request,
    instance: InstanceId,
    call: F,
) -> Result<T, HandlerOutcome>
where
    F: for<'c> FnOnce(&'c mut dyn EngineInstance, &'c mut dyn EngineContext) -> BoxFuture<'c, T>
        + Send,
{
    if !dispatcher.instances.contains(request.connection, instance) {
        warn!("{} does not own {}", request.connection, instance);
        request.fail();
        return Err(HandlerOutcome::Done);
    }

    let mut engine = match dispatcher.engines.take_instance(instance) {
        Ok(engine) => engine,
        Err(e) => {
            warn!("{}", e);
            request.fail();
            return Err(HandlerOutcome::Done);
        }
    };

    let mut ctx = DispatchContext::new(dispatcher, request, instance);
    let produced = call(engine.as_mut(), &mut ctx).await;
    let disconnected = ctx.is_disconnected();
    dispatcher.engines.restore_instance(engine);

    if disconnected {
        return Err(HandlerOutcome::Disconnected);
    }
    Ok(produced)
}
