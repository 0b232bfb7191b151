//! Engine hosting.
//!
//! Keyboard ISEs run inside the broker as [`EngineInstance`]s created by an
//! [`EngineFactory`]. Factories come from modules listed in the
//! [`ModuleRegistry`]; each keyboard catalogue entry names the module that
//! implements it.
//!
//! An instance talks back to its client only through the [`EngineContext`]
//! it is handed for the duration of one call. Queries that need an answer
//! from the client (`surrounding_text`, `selection`) suspend the call until
//! the client replies or goes away.

pub mod callback;
pub mod host;
pub mod modules;
pub mod raw;

pub use callback::Callback;
pub use host::EngineHost;
pub use modules::{ModuleRegistry, ModuleBuilder};

use crate::error::engine::EngineError;
use crate::session::InstanceId;
use crate::transaction::Transaction;

use models::KeyEvent;

use async_trait::async_trait;

/// Everything an engine may do to its client while handling a call.
#[async_trait]
pub trait EngineContext: Send {
    /// Queue a callback for the client of the instance being driven.
    fn emit(&mut self, callback: Callback);

    /// Ask the client for up to `max_before`/`max_after` characters around
    /// the caret. Returns the text and the caret offset within it, or `None`
    /// if the client could not answer.
    async fn surrounding_text(&mut self, max_before: u32, max_after: u32) -> Option<(String, u32)>;

    /// Ask the client for its current selection.
    async fn selection(&mut self) -> Option<String>;
}

/// Creates instances of one ISE.
pub trait EngineFactory: Send + Sync {
    fn uuid(&self) -> &str;

    fn name(&self) -> &str;

    fn language(&self) -> &str;

    fn locales(&self) -> Vec<String>;

    fn icon_file(&self) -> &str;

    fn help(&self) -> String {
        String::new()
    }

    fn supports_encoding(&self, encoding: &str) -> bool {
        encoding.eq_ignore_ascii_case("UTF-8")
    }

    fn create_instance(
        &self,
        id: InstanceId,
        encoding: &str,
    ) -> Result<Box<dyn EngineInstance>, EngineError>;
}

/// One live input context of an engine.
///
/// Every method except `process_key_event` defaults to doing nothing.
#[async_trait]
pub trait EngineInstance: Send {
    fn id(&self) -> InstanceId;

    fn factory_uuid(&self) -> &str;

    /// Returns true when the key was consumed.
    async fn process_key_event(&mut self, key: &KeyEvent, ctx: &mut dyn EngineContext) -> bool;

    async fn move_caret(&mut self, _position: u32, _ctx: &mut dyn EngineContext) {}

    async fn select_candidate(&mut self, _index: u32, _ctx: &mut dyn EngineContext) {}

    async fn update_lookup_table_page_size(&mut self, _size: u32, _ctx: &mut dyn EngineContext) {}

    async fn lookup_table_page_up(&mut self, _ctx: &mut dyn EngineContext) {}

    async fn lookup_table_page_down(&mut self, _ctx: &mut dyn EngineContext) {}

    async fn reset(&mut self, _ctx: &mut dyn EngineContext) {}

    async fn focus_in(&mut self, _ctx: &mut dyn EngineContext) {}

    async fn focus_out(&mut self, _ctx: &mut dyn EngineContext) {}

    async fn trigger_property(&mut self, _key: &str, _ctx: &mut dyn EngineContext) {}

    async fn process_helper_event(
        &mut self,
        _helper_uuid: &str,
        _event: &Transaction,
        _ctx: &mut dyn EngineContext,
    ) {
    }

    async fn update_client_capabilities(
        &mut self,
        _capabilities: u32,
        _ctx: &mut dyn EngineContext,
    ) {
    }

    async fn set_layout(&mut self, _layout: u32, _ctx: &mut dyn EngineContext) {}

    async fn set_im_data(&mut self, _data: &[u8], _ctx: &mut dyn EngineContext) {}
}
