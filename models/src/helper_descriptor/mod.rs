pub mod builder;

use crate::IseInfo;

use serde::{Deserialize, Serialize};

/// Bits of [`HelperDescriptor::option`].
pub mod option {
    /// The helper runs without an engine instance attached.
    pub const STAND_ALONE: u32 = 1 << 0;
    /// Start the helper as soon as the panel comes up.
    pub const AUTO_START: u32 = 1 << 1;
    /// Restart the helper when its process exits.
    pub const AUTO_RESTART: u32 = 1 << 2;
    pub const NEED_SCREEN_INFO: u32 = 1 << 3;
    pub const NEED_SPOT_LOCATION_INFO: u32 = 1 << 4;
}

/// A helper ISE that the supervisor can launch as a subprocess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HelperDescriptor {
    pub uuid: String,
    pub name: String,
    pub icon: String,
    pub description: String,
    pub option: u32,
    pub module: String,
}

impl HelperDescriptor {
    pub fn has_option(&self, bit: u32) -> bool {
        self.option & bit != 0
    }
}

impl From<&IseInfo> for HelperDescriptor {
    fn from(info: &IseInfo) -> Self {
        Self {
            uuid: info.uuid.clone(),
            name: info.name.clone(),
            icon: info.icon.clone(),
            description: info.description.clone(),
            option: info.option,
            module: info.module.clone(),
        }
    }
}
