use serde::{Deserialize, Serialize};

/// A toolbar property registered by an engine instance (e.g. input mode).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub key: String,
    pub label: String,
    pub icon: String,
    pub tip: String,
    pub visible: bool,
    pub active: bool,
}

impl Property {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            visible: true,
            ..Default::default()
        }
    }
}
