use crate::config::{PanelConfig, PathSource, resolve_config_dir};
use crate::error::config::ConfigError;
use crate::{CONFIG_DIR_ENV, CONFIG_FILE_NAME, SOCKET_ADDRESS_ENV, SOCKET_TIMEOUT_ENV};

use std::path::PathBuf;
use std::time::Duration;

use serial_test::serial;
use tempfile::TempDir;

/// **VALUE**: Verifies that a missing config file yields valid defaults.
///
/// **WHY THIS MATTERS**: The broker must start on a machine that was never configured.
///
/// **BUG THIS CATCHES**: Would catch a default that fails its own validation, such as a
/// zero reap interval.
#[test]
fn given_no_config_file_when_loading_then_valid_defaults() {
    // GIVEN: An empty config dir
    let dir = TempDir::new().unwrap();

    // WHEN: Loading
    let config = PanelConfig::load(dir.path()).unwrap();

    // THEN: Defaults that validate, with the documented socket timeout
    assert_eq!(config, PanelConfig::default());
    config.validate().unwrap();
    assert_eq!(config.frame_limits().timeout, Duration::from_millis(5000));
}

/// **VALUE**: Verifies a saved config loads back unchanged.
///
/// **WHY THIS MATTERS**: Saving goes through a temp file and a rename; a broken rename
/// would leave the old config in place.
///
/// **BUG THIS CATCHES**: Would catch a field missing its serde default and resetting.
#[test]
fn given_saved_config_when_loaded_then_values_kept() {
    // GIVEN: A customised config saved to disk
    let dir = TempDir::new().unwrap();
    let mut config = PanelConfig::default();
    config.socket.timeout_ms = 1500;
    config.helpers.display = ":3".to_string();
    config.save(dir.path()).unwrap();

    // WHEN: Loading it
    let loaded = PanelConfig::load(dir.path()).unwrap();

    // THEN: Same values, no temp file left behind
    assert_eq!(loaded, config);
    assert!(!dir.path().join(format!("{CONFIG_FILE_NAME}.tmp")).exists());
}

/// **VALUE**: Verifies partial files fill in the rest from defaults.
///
/// **WHY THIS MATTERS**: Hand-written configs usually set one or two keys.
///
/// **BUG THIS CATCHES**: Would catch a section without `#[serde(default)]`.
#[test]
fn given_partial_config_file_when_loaded_then_missing_fields_defaulted() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        r#"{ "socket": { "timeout_ms": 250 } }"#,
    )
    .unwrap();

    let config = PanelConfig::load(dir.path()).unwrap();

    assert_eq!(config.socket.timeout_ms, 250);
    assert_eq!(config.helpers, PanelConfig::default().helpers);
}

/// **VALUE**: Verifies a corrupt config file is an error rather than silent defaults.
///
/// **WHY THIS MATTERS**: Silently ignoring the file would move the socket somewhere the
/// clients are not looking.
///
/// **BUG THIS CATCHES**: Would catch parse failures falling back to `default()`.
#[test]
fn given_corrupt_config_file_when_loaded_then_parse_error() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "{ not json").unwrap();

    let result = PanelConfig::load(dir.path());

    assert!(matches!(result, Err(ConfigError::ParseError { .. })));
}

/// **VALUE**: Verifies out-of-range values are rejected by validation.
///
/// **WHY THIS MATTERS**: A zero timeout would fail every frame immediately.
///
/// **BUG THIS CATCHES**: Would catch a removed bounds check.
#[test]
fn given_invalid_values_when_validated_then_errors() {
    let mut zero_timeout = PanelConfig::default();
    zero_timeout.socket.timeout_ms = 0;
    assert!(zero_timeout.validate().is_err());

    let mut tiny_frames = PanelConfig::default();
    tiny_frames.socket.max_frame_len = 16;
    assert!(tiny_frames.validate().is_err());

    let mut future_version = PanelConfig::default();
    future_version.version = 99;
    assert!(future_version.validate().is_err());
}

/// **VALUE**: Verifies the socket environment overrides replace the configured values.
///
/// **WHY THIS MATTERS**: Test harnesses and sandboxes point clients and broker at a
/// private socket through these variables.
///
/// **BUG THIS CATCHES**: Would catch the timeout override being parsed but not applied.
#[test]
#[serial]
fn given_socket_env_overrides_when_applied_then_config_updated() {
    // GIVEN: Both overrides set
    // SAFETY: serialised with every other env-mutating test.
    unsafe {
        std::env::set_var(SOCKET_ADDRESS_ENV, "/tmp/panel-test.sock");
        std::env::set_var(SOCKET_TIMEOUT_ENV, "1234");
    }
    let mut config = PanelConfig::default();

    // WHEN: Applying overrides
    config.apply_env_overrides();

    // THEN: Both took effect
    assert_eq!(config.socket.path, PathBuf::from("/tmp/panel-test.sock"));
    assert_eq!(config.socket.timeout_ms, 1234);

    unsafe {
        std::env::remove_var(SOCKET_ADDRESS_ENV);
        std::env::remove_var(SOCKET_TIMEOUT_ENV);
    }
}

/// **VALUE**: Verifies an unparseable timeout override is ignored.
///
/// **WHY THIS MATTERS**: A typo in the environment must not stop the broker.
///
/// **BUG THIS CATCHES**: Would catch a parse failure resetting the timeout to zero.
#[test]
#[serial]
fn given_garbage_timeout_override_when_applied_then_ignored() {
    unsafe {
        std::env::set_var(SOCKET_TIMEOUT_ENV, "soon");
    }
    let mut config = PanelConfig::default();

    config.apply_env_overrides();

    assert_eq!(config.socket.timeout_ms, PanelConfig::default().socket.timeout_ms);
    unsafe {
        std::env::remove_var(SOCKET_TIMEOUT_ENV);
    }
}

/// **VALUE**: Verifies the config dir override wins over the platform default.
///
/// **WHY THIS MATTERS**: Tests and packaged installs relocate all broker files with it.
///
/// **BUG THIS CATCHES**: Would catch the env var being read after the platform lookup.
#[test]
#[serial]
fn given_config_dir_env_when_resolving_then_env_path_used() {
    unsafe {
        std::env::set_var(CONFIG_DIR_ENV, "/tmp/panel-config-test");
    }

    let resolved = resolve_config_dir();

    assert_eq!(resolved.path, PathBuf::from("/tmp/panel-config-test"));
    assert_eq!(resolved.source, PathSource::EnvVar);
    unsafe {
        std::env::remove_var(CONFIG_DIR_ENV);
    }
}

/// **VALUE**: Verifies relative store paths resolve against the config dir.
///
/// **WHY THIS MATTERS**: The default store file name is relative.
///
/// **BUG THIS CATCHES**: Would catch the store landing in the working directory.
#[test]
fn given_relative_store_path_when_resolved_then_joined_to_config_dir() {
    let config = PanelConfig::default();
    let path = config.store_path(std::path::Path::new("/etc/panel"));
    assert!(path.starts_with("/etc/panel"));
}
