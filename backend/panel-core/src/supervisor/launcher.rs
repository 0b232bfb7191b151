use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command as TokioCommand;

const DAEMON_FLAG: &str = "--daemon";
const CONFIG_FLAG: &str = "--config";
const DISPLAY_FLAG: &str = "--display";
const DISPLAY_ENV: &str = "DISPLAY";

/// How helper processes are launched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSettings {
    pub launcher: PathBuf,
    /// Name of the config module handed to the helper.
    pub config_module: String,
    /// Display the helper should attach to. Empty inherits the broker's.
    pub display: String,
}

/// `<launcher> --daemon --config <config> --display <display> <module path> <uuid>`
///
/// The child inherits the broker's environment, with `DISPLAY` overridden
/// when a display is configured.
pub fn build_launch_command(
    settings: &LaunchSettings,
    module_path: &Path,
    uuid: &str,
) -> TokioCommand {
    let mut cmd = TokioCommand::new(&settings.launcher);
    cmd.arg(DAEMON_FLAG)
        .arg(CONFIG_FLAG)
        .arg(&settings.config_module)
        .arg(DISPLAY_FLAG)
        .arg(&settings.display)
        .arg(module_path)
        .arg(uuid)
        .stdin(Stdio::null())
        .kill_on_drop(false);
    if !settings.display.is_empty() {
        cmd.env(DISPLAY_ENV, &settings.display);
    }
    cmd
}
