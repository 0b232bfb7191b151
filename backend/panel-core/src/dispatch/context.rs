use crate::dispatch::{ContinuationOutcome, Dispatcher, Query, Request};
use crate::engine::{Callback, EngineContext};
use crate::session::InstanceId;
use crate::transaction::Transaction;

use async_trait::async_trait;
use log::warn;

/// The [`EngineContext`] handed to an instance while the dispatcher serves
/// one of its client's requests.
pub(crate) struct DispatchContext<'a> {
    dispatcher: &'a mut Dispatcher,
    request: &'a mut Request,
    instance: InstanceId,
    disconnected: bool,
}

impl<'a> DispatchContext<'a> {
    pub(crate) fn new(
        dispatcher: &'a mut Dispatcher,
        request: &'a mut Request,
        instance: InstanceId,
    ) -> Self {
        Self {
            dispatcher,
            request,
            instance,
            disconnected: false,
        }
    }

    /// True once a query found the client gone. Later queries return
    /// `None` without touching the socket.
    pub(crate) fn is_disconnected(&self) -> bool {
        self.disconnected
    }

    async fn ask(&mut self, query: Query) -> Option<Transaction> {
        if self.disconnected {
            return None;
        }
        match self.dispatcher.run_continuation(self.request, query).await {
            ContinuationOutcome::Answered(answer) => Some(answer),
            ContinuationOutcome::Disconnected | ContinuationOutcome::TimedOut => {
                self.disconnected = true;
                None
            }
        }
    }
}

#[async_trait]
impl EngineContext for DispatchContext<'_> {
    fn emit(&mut self, callback: Callback) {
        self.dispatcher
            .route_callback(self.instance, callback, &mut self.request.reply);
    }

    async fn surrounding_text(&mut self, max_before: u32, max_after: u32) -> Option<(String, u32)> {
        let mut answer = self
            .ask(Query::SurroundingText {
                instance: self.instance,
                max_before,
                max_after,
            })
            .await?;
        match (answer.get::<String>(), answer.get::<u32>()) {
            (Ok(text), Ok(cursor)) => Some((text, cursor)),
            _ => {
                warn!("{}: malformed surrounding text answer", self.request.connection);
                None
            }
        }
    }

    async fn selection(&mut self) -> Option<String> {
        let mut answer = self
            .ask(Query::Selection {
                instance: self.instance,
            })
            .await?;
        match answer.get::<String>() {
            Ok(text) => Some(text),
            Err(e) => {
                warn!("{}: malformed selection answer: {}", self.request.connection, e);
                None
            }
        }
    }
}
