//! Mid-request queries to the client.
//!
//! An engine handling a request may need something only the client knows,
//! such as the text around the caret. The dispatcher then:
//!
//! 1. remembers where it was in the inbound request,
//! 2. flushes everything replied so far followed by `Continue` and the
//!    query,
//! 3. waits for the client's `[Request][key][query opcode]` answer, parking
//!    events from other connections in the deferred queue,
//! 4. resumes the request where it left off.
//!
//! A client that closes, or stays silent past the socket timeout, counts as
//! disconnected: the outer request gets no reply and the connection is torn
//! down once the handler returns.

use crate::dispatch::{Dispatcher, InboundEvent, InboundKind, Request};
use crate::session::{ConnectionId, InstanceId};
use crate::transaction::{Cursor, Opcode, Transaction};

use log::{debug, trace, warn};
use tokio::time::{Instant, timeout_at};

/// A question for the client of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Query {
    SurroundingText {
        instance: InstanceId,
        max_before: u32,
        max_after: u32,
    },
    Selection {
        instance: InstanceId,
    },
}

impl Query {
    pub fn opcode(&self) -> Opcode {
        match self {
            Query::SurroundingText { .. } => Opcode::GetSurroundingText,
            Query::Selection { .. } => Opcode::GetSelection,
        }
    }

    /// Append `[opcode][Uint32 instance][arguments]`.
    pub fn encode(&self, trans: &mut Transaction) {
        trans.put_command(self.opcode());
        match *self {
            Query::SurroundingText {
                instance,
                max_before,
                max_after,
            } => {
                trans.put(&instance.get()).put(&max_before).put(&max_after);
            }
            Query::Selection { instance } => {
                trans.put(&instance.get());
            }
        }
    }
}

/// Bookkeeping for one outstanding query.
#[derive(Debug, Clone, Copy)]
pub struct ContinuationState {
    pub connection: ConnectionId,
    pub expected: Opcode,
    pub saved_cursor: Cursor,
}

#[derive(Debug)]
pub enum ContinuationOutcome {
    /// The answer, positioned after `[Request][key][opcode]`.
    Answered(Transaction),
    Disconnected,
    TimedOut,
}

impl Dispatcher {
    /// Ask the requester `query` and wait for the answer.
    pub(crate) async fn run_continuation(
        &mut self,
        request: &mut Request,
        query: Query,
    ) -> ContinuationOutcome {
        let state = ContinuationState {
            connection: request.connection,
            expected: query.opcode(),
            saved_cursor: request.inbound.cursor(),
        };

        let mut pending = std::mem::replace(&mut request.reply, Transaction::reply());
        pending.put_command(Opcode::Continue);
        query.encode(&mut pending);

        debug!("{}: continuation {}", state.connection, state.expected);
        if let Err(e) = self.registry.send(state.connection, &pending, &self.limits).await {
            warn!("{}: continuation write failed: {}", state.connection, e);
            return ContinuationOutcome::Disconnected;
        }

        let outcome = self.await_answer(&state).await;
        request.inbound.restore(state.saved_cursor);
        outcome
    }

    async fn await_answer(&mut self, state: &ContinuationState) -> ContinuationOutcome {
        let already_closed = self.deferred.iter().any(|event| {
            event.connection == state.connection && matches!(event.kind, InboundKind::Closed(_))
        });
        if already_closed {
            return ContinuationOutcome::Disconnected;
        }

        let deadline = Instant::now() + self.limits.timeout;
        loop {
            let event = match timeout_at(deadline, self.events_rx.recv()).await {
                Err(_) => {
                    warn!(
                        "{}: no answer to {} within {:?}",
                        state.connection, state.expected, self.limits.timeout
                    );
                    return ContinuationOutcome::TimedOut;
                }
                Ok(None) => return ContinuationOutcome::Disconnected,
                Ok(Some(event)) => event,
            };

            if event.connection != state.connection {
                trace!("Deferring event from {}", event.connection);
                self.deferred.push_back(event);
                continue;
            }

            match event.kind {
                InboundKind::Malformed(reason) => {
                    debug!("{}: deferring malformed frame", state.connection);
                    self.deferred.push_back(InboundEvent {
                        connection: state.connection,
                        kind: InboundKind::Malformed(reason),
                    });
                }
                InboundKind::Closed(reason) => {
                    debug!("{} closed during continuation: {}", state.connection, reason);
                    return ContinuationOutcome::Disconnected;
                }
                InboundKind::Frame(mut trans) => {
                    if self.is_answer(state, &mut trans) {
                        return ContinuationOutcome::Answered(trans);
                    }
                    trans.rewind();
                    debug!("{}: deferring non-answer frame", state.connection);
                    self.deferred.push_back(InboundEvent {
                        connection: state.connection,
                        kind: InboundKind::Frame(trans),
                    });
                }
            }
        }
    }

    fn is_answer(&self, state: &ContinuationState, trans: &mut Transaction) -> bool {
        let Some(record) = self.registry.get(state.connection) else {
            return false;
        };
        trans.get_command().is_ok_and(|op| op == Opcode::Request)
            && trans.get::<u32>().is_ok_and(|key| record.key_matches(key))
            && trans.get_command().is_ok_and(|op| op == state.expected)
    }
}
