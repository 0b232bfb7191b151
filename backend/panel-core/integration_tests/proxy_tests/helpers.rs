//! Test helpers for running a real broker behind a socket file.

use panel_core::config::PanelConfig;
use panel_core::engine::Callback;
use panel_core::observer::LoggingObserver;
use panel_core::proxy::{ClientCallbacks, InstanceHandle, ProxySettings};
use panel_core::server::PanelServer;
use panel_core::transaction::FrameLimits;

use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;

pub const RAW_UUID: &str = "raw-en";
pub const CAPS_UUID: &str = "raw-caps";

const RAW_MANIFEST: &str = r#"
[[ise]]
name = "Raw English"
uuid = "raw-en"
language = "en"

[[ise]]
name = "Raw German"
uuid = "raw-de"
language = "de"

[[ise]]
name = "Raw English (capitalising)"
uuid = "raw-caps"
language = "en"
option = 1
"#;

/// A config whose every path lives under `dir`.
pub fn test_config(dir: &Path) -> PanelConfig {
    let keyboard_dir = dir.join("keyboards");
    std::fs::create_dir_all(&keyboard_dir).unwrap();
    std::fs::create_dir_all(dir.join("helpers")).unwrap();
    std::fs::write(keyboard_dir.join("raw.ise"), RAW_MANIFEST).unwrap();

    let mut config = PanelConfig::default();
    config.socket.path = dir.join("panel.sock");
    config.socket.timeout_ms = 1000;
    config.modules.keyboard_dir = keyboard_dir;
    config.modules.helper_dir = dir.join("helpers");
    config.modules.cache_path = dir.join("ise-info.cache");
    config.helpers.launcher = "true".into();
    config.store.path = dir.join("store.json");
    config
}

pub fn test_dir() -> TempDir {
    TempDir::new().unwrap()
}

pub async fn start_server(config: &PanelConfig, dir: &Path) -> PanelServer {
    PanelServer::start(config, dir, Box::new(LoggingObserver))
        .await
        .unwrap()
}

pub fn proxy_settings(config: &PanelConfig) -> ProxySettings {
    let mut settings = ProxySettings::new(&config.socket.path);
    settings.limits = FrameLimits::new(Duration::from_millis(1000), 1024 * 1024);
    settings.reconnect_max_elapsed = Duration::from_secs(2);
    settings
}

/// Records callbacks and answers surrounding text queries from a fixed value.
#[derive(Default)]
pub struct RecordingCallbacks {
    pub received: Vec<(InstanceHandle, Callback)>,
    pub surrounding: Option<(String, u32)>,
    pub queries: usize,
}

impl RecordingCallbacks {
    pub fn commits(&self) -> Vec<&str> {
        self.received
            .iter()
            .filter_map(|(_, callback)| match callback {
                Callback::CommitString(text) => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl ClientCallbacks for RecordingCallbacks {
    fn on_callback(&mut self, handle: InstanceHandle, callback: Callback) {
        self.received.push((handle, callback));
    }

    fn surrounding_text(
        &mut self,
        _handle: InstanceHandle,
        _max_before: u32,
        _max_after: u32,
    ) -> Option<(String, u32)> {
        self.queries += 1;
        self.surrounding.clone()
    }
}
