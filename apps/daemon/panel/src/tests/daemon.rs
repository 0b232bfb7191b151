use crate::daemon::{LOG_DIR_ENV, log_dir};

use std::path::PathBuf;

use serial_test::serial;

/// **VALUE**: Verifies the log dir override wins over the platform default.
///
/// **WHY THIS MATTERS**: Sandboxed sessions cannot write to the user's data dir.
///
/// **BUG THIS CATCHES**: Would catch the override being read but ignored.
#[test]
#[serial]
fn given_log_dir_env_when_resolving_then_override_used() {
    // SAFETY: serialised with every other env-mutating test.
    unsafe {
        std::env::set_var(LOG_DIR_ENV, "/tmp/panel-log-test");
    }

    let dir = log_dir();

    assert_eq!(dir, PathBuf::from("/tmp/panel-log-test"));
    unsafe {
        std::env::remove_var(LOG_DIR_ENV);
    }
}

/// **VALUE**: Verifies an empty override falls back to the default.
///
/// **WHY THIS MATTERS**: `PANEL_LOG_DIR=` in a unit file must not log into the working
/// directory.
///
/// **BUG THIS CATCHES**: Would catch an empty string becoming a relative path.
#[test]
#[serial]
fn given_empty_log_dir_env_when_resolving_then_default_used() {
    unsafe {
        std::env::set_var(LOG_DIR_ENV, "");
    }

    let dir = log_dir();

    assert!(dir.ends_with("logs"));
    assert!(dir.is_absolute());
    unsafe {
        std::env::remove_var(LOG_DIR_ENV);
    }
}
