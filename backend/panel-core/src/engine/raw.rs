//! The built-in `raw` keyboard module.
//!
//! Commits printable keys unchanged. With [`OPTION_AUTO_CAPITALIZE`] set on
//! the catalogue entry, a letter typed at the start of a sentence is
//! upper-cased after asking the client for the text before the caret.

use crate::engine::{Callback, EngineContext, EngineFactory, EngineInstance};
use crate::error::engine::EngineError;
use crate::session::InstanceId;

use common::ErrorLocation;
use models::{IseInfo, IseMode, KeyEvent, Property};

use std::panic::Location;

use async_trait::async_trait;
use log::debug;

pub const MODULE_NAME: &str = "raw";

/// Catalogue option bit enabling sentence-start capitalisation.
pub const OPTION_AUTO_CAPITALIZE: u32 = 1;

pub const AUTO_CAPITALIZE_PROPERTY: &str = "/raw/auto-capitalize";

/// Characters of context requested before and after the caret.
const SURROUNDING_CONTEXT: u32 = 10;

pub fn build_factory(info: &IseInfo) -> Result<Box<dyn EngineFactory>, EngineError> {
    if info.mode != IseMode::Keyboard {
        return Err(EngineError::ModuleLoad {
            message: format!("{} is a helper ISE, not a keyboard", info.uuid),
            location: ErrorLocation::from(Location::caller()),
        });
    }
    Ok(Box::new(RawFactory {
        info: info.clone(),
    }))
}

pub struct RawFactory {
    info: IseInfo,
}

impl EngineFactory for RawFactory {
    fn uuid(&self) -> &str {
        &self.info.uuid
    }

    fn name(&self) -> &str {
        &self.info.name
    }

    fn language(&self) -> &str {
        &self.info.language
    }

    fn locales(&self) -> Vec<String> {
        self.info.locales.clone()
    }

    fn icon_file(&self) -> &str {
        &self.info.icon
    }

    fn help(&self) -> String {
        if self.info.description.is_empty() {
            format!("{}: commits keys as typed.", self.info.name)
        } else {
            self.info.description.clone()
        }
    }

    fn create_instance(
        &self,
        id: InstanceId,
        encoding: &str,
    ) -> Result<Box<dyn EngineInstance>, EngineError> {
        if !self.supports_encoding(encoding) {
            return Err(EngineError::InstanceCreation {
                message: format!("{} does not support encoding '{encoding}'", self.info.uuid),
                location: ErrorLocation::from(Location::caller()),
            });
        }
        Ok(Box::new(RawInstance {
            id,
            factory: self.info.uuid.clone(),
            auto_capitalize: self.info.option & OPTION_AUTO_CAPITALIZE != 0,
        }))
    }
}

pub struct RawInstance {
    id: InstanceId,
    factory: String,
    auto_capitalize: bool,
}

impl RawInstance {
    fn auto_capitalize_property(&self) -> Property {
        Property {
            key: AUTO_CAPITALIZE_PROPERTY.to_string(),
            label: "Aa".to_string(),
            icon: String::new(),
            tip: "Capitalise the first letter of each sentence".to_string(),
            visible: true,
            active: self.auto_capitalize,
        }
    }
}

/// True when `before` ends where a new sentence starts.
fn at_sentence_start(before: &str) -> bool {
    match before.trim_end().chars().last() {
        None => true,
        Some(ch) => matches!(ch, '.' | '!' | '?'),
    }
}

#[async_trait]
impl EngineInstance for RawInstance {
    fn id(&self) -> InstanceId {
        self.id
    }

    fn factory_uuid(&self) -> &str {
        &self.factory
    }

    async fn process_key_event(&mut self, key: &KeyEvent, ctx: &mut dyn EngineContext) -> bool {
        if key.is_release() || key.has_modifier() {
            return false;
        }
        let Some(ch) = key.to_char() else {
            return false;
        };

        let mut text = ch.to_string();
        if self.auto_capitalize && ch.is_lowercase() {
            if let Some((surrounding, cursor)) =
                ctx.surrounding_text(SURROUNDING_CONTEXT, SURROUNDING_CONTEXT).await
            {
                let before: String = surrounding.chars().take(cursor as usize).collect();
                if at_sentence_start(&before) {
                    text = ch.to_uppercase().collect();
                }
            } else {
                debug!("{}: no surrounding text, committing as typed", self.id);
            }
        }

        ctx.emit(Callback::CommitString(text));
        true
    }

    async fn focus_in(&mut self, ctx: &mut dyn EngineContext) {
        ctx.emit(Callback::RegisterProperties(vec![
            self.auto_capitalize_property(),
        ]));
    }

    async fn reset(&mut self, ctx: &mut dyn EngineContext) {
        ctx.emit(Callback::HidePreeditString);
    }

    async fn trigger_property(&mut self, key: &str, ctx: &mut dyn EngineContext) {
        if key == AUTO_CAPITALIZE_PROPERTY {
            self.auto_capitalize = !self.auto_capitalize;
            ctx.emit(Callback::UpdateProperty(self.auto_capitalize_property()));
        }
    }
}
