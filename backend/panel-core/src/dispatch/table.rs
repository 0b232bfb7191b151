//! Opcode to handler mapping.

use crate::dispatch::{Dispatcher, HandlerOutcome, Request};
use crate::session::Role;
use crate::transaction::Opcode;

use std::collections::BTreeMap;
use std::fmt;

use futures_util::future::BoxFuture;

pub type SyncHandler = fn(&mut Dispatcher, &mut Request) -> HandlerOutcome;

pub type AsyncHandler =
    for<'a> fn(&'a mut Dispatcher, &'a mut Request) -> BoxFuture<'a, HandlerOutcome>;

/// Handlers that may wait on a client are async; everything else is a plain
/// function.
#[derive(Clone, Copy)]
pub enum Handler {
    Sync(SyncHandler),
    Async(AsyncHandler),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handler::Sync(_) => f.write_str("Handler::Sync"),
            Handler::Async(_) => f.write_str("Handler::Async"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct HandlerEntry {
    pub roles: &'static [Role],
    pub handler: Handler,
}

impl HandlerEntry {
    pub fn permits(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}

/// Problems found by [`HandlerTable::validate`].
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TableReport {
    pub duplicates: Vec<Opcode>,
    pub missing: Vec<Opcode>,
}

impl TableReport {
    pub fn is_valid(&self) -> bool {
        self.duplicates.is_empty() && self.missing.is_empty()
    }
}

impl fmt::Display for TableReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let list = |opcodes: &[Opcode]| {
            opcodes
                .iter()
                .map(|opcode| opcode.name())
                .collect::<Vec<_>>()
                .join(", ")
        };
        write!(
            f,
            "duplicates [{}], missing [{}]",
            list(&self.duplicates),
            list(&self.missing)
        )
    }
}

#[derive(Debug, Default)]
pub struct HandlerTable {
    entries: BTreeMap<Opcode, HandlerEntry>,
    duplicates: Vec<Opcode>,
}

impl HandlerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `opcode`. A second registration for the same
    /// opcode is kept out of the table and reported by `validate`.
    pub fn register(
        &mut self,
        opcode: Opcode,
        roles: &'static [Role],
        handler: Handler,
    ) -> &mut Self {
        if self.entries.contains_key(&opcode) {
            self.duplicates.push(opcode);
        } else {
            self.entries.insert(opcode, HandlerEntry { roles, handler });
        }
        self
    }

    pub fn sync(
        &mut self,
        opcode: Opcode,
        roles: &'static [Role],
        handler: SyncHandler,
    ) -> &mut Self {
        self.register(opcode, roles, Handler::Sync(handler))
    }

    pub fn asynchronous(
        &mut self,
        opcode: Opcode,
        roles: &'static [Role],
        handler: AsyncHandler,
    ) -> &mut Self {
        self.register(opcode, roles, Handler::Async(handler))
    }

    pub fn get(&self, opcode: Opcode) -> Option<&HandlerEntry> {
        self.entries.get(&opcode)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check for duplicate registrations and for any of `required` lacking
    /// a handler.
    pub fn validate(&self, required: &[Opcode]) -> TableReport {
        TableReport {
            duplicates: self.duplicates.clone(),
            missing: required
                .iter()
                .copied()
                .filter(|opcode| !self.entries.contains_key(opcode))
                .collect(),
        }
    }
}
