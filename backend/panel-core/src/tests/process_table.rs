use crate::error::spawn::SpawnError;
use crate::supervisor::launcher::{LaunchSettings, build_launch_command};
use crate::supervisor::{ExitRecord, ProcessTable};

use std::path::Path;
use std::time::Duration;

use tokio::process::Command as TokioCommand;

fn failing() -> TokioCommand {
    let mut cmd = TokioCommand::new("sh");
    cmd.arg("-c").arg("exit 3");
    cmd
}

/// Poll `reap` until `uuid` has been collected.
async fn reap_until(table: &mut ProcessTable, uuid: &str) -> ExitRecord {
    for _ in 0..200 {
        if let Some(record) = table.reap().into_iter().find(|record| record.uuid == uuid) {
            return record;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("{uuid} was never reaped");
}

/// **VALUE**: Verifies an abnormal exit is observed with its status and removes the child.
///
/// **WHY THIS MATTERS**: Exited helpers that are never reaped pile up as zombies.
///
/// **BUG THIS CATCHES**: Would catch `reap` leaving exited children in the table.
#[tokio::test]
async fn given_failing_child_when_reaped_then_abnormal_record_and_table_empty() {
    // GIVEN: A table with a child that exits with status 3
    let mut table = ProcessTable::new(3, Duration::from_secs(60));
    table.spawn("h", failing()).unwrap();
    assert!(table.is_running("h"));

    // WHEN: Reaping until it shows up
    let record = reap_until(&mut table, "h").await;

    // THEN: Abnormal exit with code 3, nothing left running
    assert!(record.is_abnormal());
    assert_eq!(record.status.and_then(|status| status.code()), Some(3));
    assert!(table.is_empty());
}

/// **VALUE**: Verifies a clean exit does not count as a crash.
///
/// **WHY THIS MATTERS**: Helpers that quit on request must remain launchable.
///
/// **BUG THIS CATCHES**: Would catch every exit being recorded as a crash.
#[tokio::test]
async fn given_clean_exit_when_reaped_then_not_abnormal() {
    let mut table = ProcessTable::new(0, Duration::from_secs(60));
    table.spawn("ok", TokioCommand::new("true")).unwrap();

    let record = reap_until(&mut table, "ok").await;

    assert!(!record.is_abnormal());
    assert!(!table.is_crash_looping("ok"));
}

/// **VALUE**: Verifies repeated crashes inside the window block further launches.
///
/// **WHY THIS MATTERS**: A helper that dies on start would otherwise be relaunched on
/// every reap tick forever.
///
/// **BUG THIS CATCHES**: Would catch the crash counter never being consulted in `spawn`.
#[tokio::test]
async fn given_helper_crashing_repeatedly_when_spawned_again_then_crash_loop_error() {
    // GIVEN: A limit of two restarts and three observed crashes
    let mut table = ProcessTable::new(2, Duration::from_secs(60));
    for _ in 0..3 {
        table.spawn("loop", failing()).unwrap();
        reap_until(&mut table, "loop").await;
    }

    // WHEN: Spawning a fourth time
    let result = table.spawn("loop", failing());

    // THEN: Refused as a crash loop
    assert!(matches!(result, Err(SpawnError::CrashLoop { .. })));
    assert!(!table.is_running("loop"));
}

/// **VALUE**: Verifies crashes older than the window are forgotten.
///
/// **WHY THIS MATTERS**: A helper that crashed last week must not be locked out today.
///
/// **BUG THIS CATCHES**: Would catch the window pruning being skipped.
#[tokio::test]
async fn given_crashes_outside_window_when_checked_then_not_looping() {
    let mut table = ProcessTable::new(0, Duration::from_millis(20));
    table.record_crash("old");
    assert!(table.is_crash_looping("old"));

    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(!table.is_crash_looping("old"));
}

/// **VALUE**: Verifies a second launch of a live helper is refused.
///
/// **WHY THIS MATTERS**: Two processes for one uuid would both try to register.
///
/// **BUG THIS CATCHES**: Would catch the live-process check being dropped.
#[tokio::test]
async fn given_live_child_when_spawned_again_then_error() {
    // GIVEN: A long running child
    let mut table = ProcessTable::new(3, Duration::from_secs(60));
    let mut sleeper = TokioCommand::new("sleep");
    sleeper.arg("5");
    table.spawn("busy", sleeper).unwrap();

    // WHEN: Launching again
    let mut again = TokioCommand::new("sleep");
    again.arg("5");
    let result = table.spawn("busy", again);

    // THEN: Refused; shutdown kills the original
    assert!(matches!(result, Err(SpawnError::Spawn { .. })));
    table.shutdown().await;
    assert!(table.is_empty());
}

/// **VALUE**: Verifies the launcher command line carries the module path and uuid last.
///
/// **WHY THIS MATTERS**: The launcher parses positionally after its flags.
///
/// **BUG THIS CATCHES**: Would catch flag and positional arguments being swapped.
#[test]
fn given_launch_settings_when_building_command_then_argument_order_is_fixed() {
    let settings = LaunchSettings {
        launcher: "/usr/lib/panel/launcher".into(),
        config_module: "simple".to_string(),
        display: ":1".to_string(),
    };

    let command = build_launch_command(&settings, Path::new("/opt/hw"), "hw-1");
    let std_command = command.as_std();
    let args: Vec<String> = std_command
        .get_args()
        .map(|arg| arg.to_string_lossy().into_owned())
        .collect();

    assert_eq!(std_command.get_program(), "/usr/lib/panel/launcher");
    assert_eq!(
        args,
        vec!["--daemon", "--config", "simple", "--display", ":1", "/opt/hw", "hw-1"]
    );
}
