use crate::engine::{EngineFactory, EngineInstance, ModuleRegistry};
use crate::error::engine::EngineError;
use crate::session::InstanceId;

use common::ErrorLocation;
use models::{IseInfo, IseMode};

use std::collections::{BTreeMap, HashMap};
use std::panic::Location;

use log::{info, warn};

/// Factories and live instances of the keyboard ISEs run in-process.
pub struct EngineHost {
    modules: ModuleRegistry,
    factories: BTreeMap<String, Box<dyn EngineFactory>>,
    instances: HashMap<InstanceId, Box<dyn EngineInstance>>,
    last_id: u32,
}

impl EngineHost {
    pub fn new(modules: ModuleRegistry) -> Self {
        Self {
            modules,
            factories: BTreeMap::new(),
            instances: HashMap::new(),
            last_id: 0,
        }
    }

    /// Rebuild the factory set from the keyboard entries of the catalogue.
    ///
    /// Entries whose module cannot be built are left out. Live instances
    /// are untouched.
    pub fn load_factories<'a>(&mut self, entries: impl IntoIterator<Item = &'a IseInfo>) {
        self.factories.clear();
        for info in entries {
            if info.mode != IseMode::Keyboard {
                continue;
            }
            match self.modules.build(info) {
                Ok(factory) => {
                    self.factories.insert(info.uuid.clone(), factory);
                }
                Err(e) => warn!("Skipping ISE {}: {}", info.uuid, e),
            }
        }
        info!("Loaded {} engine factories", self.factories.len());
    }

    pub fn factory(&self, uuid: &str) -> Option<&dyn EngineFactory> {
        self.factories.get(uuid).map(|factory| factory.as_ref())
    }

    /// Uuids of every factory accepting `encoding`; an empty encoding
    /// matches all.
    pub fn factory_uuids(&self, encoding: &str) -> Vec<String> {
        self.factories
            .values()
            .filter(|factory| encoding.is_empty() || factory.supports_encoding(encoding))
            .map(|factory| factory.uuid().to_string())
            .collect()
    }

    /// Create an instance. Ids start at 1 and are never handed out twice.
    #[track_caller]
    pub fn new_instance(&mut self, uuid: &str, encoding: &str) -> Result<InstanceId, EngineError> {
        let factory = self
            .factories
            .get(uuid)
            .ok_or_else(|| EngineError::UnknownFactory {
                message: format!("no factory with uuid '{uuid}'"),
                location: ErrorLocation::from(Location::caller()),
            })?;

        let next = self.last_id.checked_add(1).ok_or_else(|| EngineError::InstanceCreation {
            message: "instance ids exhausted".to_string(),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let id = InstanceId::new(next);
        let instance = factory.create_instance(id, encoding)?;

        self.last_id = next;
        self.instances.insert(id, instance);
        info!("Created {} of {}", id, uuid);
        Ok(id)
    }

    pub fn delete_instance(&mut self, id: InstanceId) -> bool {
        let removed = self.instances.remove(&id).is_some();
        if removed {
            info!("Destroyed {}", id);
        }
        removed
    }

    pub fn contains(&self, id: InstanceId) -> bool {
        self.instances.contains_key(&id)
    }

    /// Take an instance out for the duration of a call that also needs
    /// mutable access to the rest of the broker.
    ///
    /// Must be paired with [`EngineHost::restore_instance`].
    #[track_caller]
    pub fn take_instance(
        &mut self,
        id: InstanceId,
    ) -> Result<Box<dyn EngineInstance>, EngineError> {
        self.instances
            .remove(&id)
            .ok_or_else(|| EngineError::UnknownInstance {
                message: format!("{id} does not exist"),
                location: ErrorLocation::from(Location::caller()),
            })
    }

    pub fn restore_instance(&mut self, instance: Box<dyn EngineInstance>) {
        self.instances.insert(instance.id(), instance);
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn factory_count(&self) -> usize {
        self.factories.len()
    }
}
