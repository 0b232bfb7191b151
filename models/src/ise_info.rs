use serde::{Deserialize, Serialize};

/// Whether an ISE runs inside the broker as a keyboard engine or as a
/// separate helper process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IseMode {
    Keyboard,
    Helper,
}

impl IseMode {
    pub fn as_str(self) -> &'static str {
        match self {
            IseMode::Keyboard => "keyboard",
            IseMode::Helper => "helper",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "keyboard" => Some(IseMode::Keyboard),
            "helper" => Some(IseMode::Helper),
            _ => None,
        }
    }
}

/// One installed input source engine, as recorded in the catalogue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IseInfo {
    pub name: String,
    pub uuid: String,
    pub module: String,
    pub language: String,
    pub icon: String,
    pub mode: IseMode,
    pub option: u32,
    pub locales: Vec<String>,
    /// Not persisted in the cache file; filled from the module manifest.
    #[serde(default)]
    pub description: String,
}
