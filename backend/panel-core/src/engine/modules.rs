use crate::engine::{EngineFactory, raw};
use crate::error::engine::EngineError;

use common::ErrorLocation;
use models::IseInfo;

use std::collections::BTreeMap;
use std::panic::Location;

/// Builds the factory for one catalogue entry of a module.
pub type ModuleBuilder = fn(&IseInfo) -> Result<Box<dyn EngineFactory>, EngineError>;

/// Engine modules compiled into the broker, by module name.
#[derive(Clone)]
pub struct ModuleRegistry {
    builders: BTreeMap<String, ModuleBuilder>,
}

impl Default for ModuleRegistry {
    /// Registry with every built-in module.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(raw::MODULE_NAME, raw::build_factory);
        registry
    }
}

impl ModuleRegistry {
    pub fn empty() -> Self {
        Self {
            builders: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, module: impl Into<String>, builder: ModuleBuilder) {
        self.builders.insert(module.into(), builder);
    }

    pub fn contains(&self, module: &str) -> bool {
        self.builders.contains_key(module)
    }

    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.builders.keys().map(String::as_str)
    }

    #[track_caller]
    pub fn build(&self, info: &IseInfo) -> Result<Box<dyn EngineFactory>, EngineError> {
        let builder = self
            .builders
            .get(&info.module)
            .ok_or_else(|| EngineError::ModuleLoad {
                message: format!(
                    "module '{}' for ISE {} is not available",
                    info.module, info.uuid
                ),
                location: ErrorLocation::from(Location::caller()),
            })?;
        builder(info)
    }
}
