//! Typed key/value store served to config clients.
//!
//! Values live in memory until a client asks for a flush; the backing JSON
//! file is replaced through a temp file and a rename.

use crate::error::config::ConfigError;

use common::ErrorLocation;

use std::collections::BTreeMap;
use std::panic::Location;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ConfigValue {
    String(String),
    Int(i32),
    Bool(bool),
    Double(f64),
    StringList(Vec<String>),
    IntList(Vec<i32>),
}

#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    values: BTreeMap<String, ConfigValue>,
    dirty: bool,
}

impl ConfigStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = read_values(&path)?;
        Ok(Self {
            path,
            values,
            dirty: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(ConfigValue::String(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_int(&self, key: &str) -> Option<i32> {
        match self.values.get(key) {
            Some(ConfigValue::Int(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(ConfigValue::Bool(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_double(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(ConfigValue::Double(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn get_string_list(&self, key: &str) -> Option<&[String]> {
        match self.values.get(key) {
            Some(ConfigValue::StringList(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_int_list(&self, key: &str) -> Option<&[i32]> {
        match self.values.get(key) {
            Some(ConfigValue::IntList(value)) => Some(value),
            _ => None,
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: ConfigValue) {
        let key = key.into();
        if self.values.get(&key) != Some(&value) {
            debug!("Config store: set {}", key);
            self.values.insert(key, value);
            self.dirty = true;
        }
    }

    pub fn erase(&mut self, key: &str) -> bool {
        let erased = self.values.remove(key).is_some();
        self.dirty |= erased;
        erased
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Persist pending changes. Nothing is written when nothing changed.
    pub fn flush(&mut self) -> Result<(), ConfigError> {
        if !self.dirty {
            return Ok(());
        }

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| ConfigError::WriteError {
                location: ErrorLocation::from(Location::caller()),
                path: dir.to_path_buf(),
                source: e,
            })?;
        }

        let json =
            serde_json::to_string_pretty(&self.values).map_err(|e| ConfigError::SerializeError {
                location: ErrorLocation::from(Location::caller()),
                reason: e.to_string(),
            })?;

        let mut temp_name = self.path.as_os_str().to_os_string();
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        std::fs::write(&temp_path, json).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: temp_path.clone(),
            source: e,
        })?;

        std::fs::rename(&temp_path, &self.path).map_err(|e| ConfigError::WriteError {
            location: ErrorLocation::from(Location::caller()),
            path: self.path.clone(),
            source: e,
        })?;

        self.dirty = false;
        info!("Config store flushed to {}", self.path.display());
        Ok(())
    }

    /// Discard in-memory state and re-read the backing file.
    pub fn reload(&mut self) -> Result<(), ConfigError> {
        self.values = read_values(&self.path)?;
        self.dirty = false;
        info!("Config store reloaded from {}", self.path.display());
        Ok(())
    }
}

fn read_values(path: &Path) -> Result<BTreeMap<String, ConfigValue>, ConfigError> {
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        source: e,
    })?;
    serde_json::from_str(&contents).map_err(|e| ConfigError::ParseError {
        location: ErrorLocation::from(Location::caller()),
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
