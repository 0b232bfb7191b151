use crate::broker_tests::helpers::{BrokerOptions, HELPER_UUID, TestBroker};

use panel_core::error::spawn::SpawnError;
use panel_core::session::Role;
use panel_core::supervisor::HelperState;
use panel_core::transaction::Opcode;
use panel_core::transaction::records::get_helper_list;

use models::helper_descriptor::option;

use std::path::PathBuf;
use std::time::Duration;

/// **VALUE**: Verifies the helper list comes from the scanned helper directory.
///
/// **WHY THIS MATTERS**: The helper manager shows this list to the user.
///
/// **BUG THIS CATCHES**: Would catch keyboard ISEs leaking into the helper list.
#[tokio::test]
async fn given_scanned_helper_when_listing_then_only_helpers_returned() {
    let mut broker = TestBroker::new();
    let mut manager = broker.connect(Role::HelperManagerClient).await;

    let mut request = manager.request();
    request.put_command(Opcode::GetHelperList);
    let mut reply = broker.call(&mut manager, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    let helpers = get_helper_list(&mut reply).unwrap();
    assert_eq!(helpers.len(), 1);
    assert_eq!(helpers[0].uuid, HELPER_UUID);
    assert_eq!(helpers[0].name, "Handwriting");
}

/// **VALUE**: Verifies `TerminateHelper` is forwarded to the helper's own connection and
/// acknowledged to the requester.
///
/// **WHY THIS MATTERS**: Helpers shut themselves down; the broker only relays the
/// request to the right socket.
///
/// **BUG THIS CATCHES**: Would catch the stop request going back to the requester, or
/// being acknowledged for a helper that never registered.
#[tokio::test]
async fn given_registered_helper_when_terminated_then_request_forwarded_to_helper() {
    // GIVEN: A helper process connection that registered itself
    let mut broker = TestBroker::new();
    let mut helper = broker.connect(Role::HelperManagerClient).await;
    let mut manager = broker.connect(Role::HelperManagerClient).await;

    let mut register = helper.request();
    register.put_command(Opcode::RegisterHelper).put(HELPER_UUID);
    let mut reply = broker.call(&mut helper, &register).await;
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(
        broker.dispatcher.supervisor().state(HELPER_UUID),
        Some(HelperState::Running)
    );

    // WHEN: The manager asks for it to terminate
    let mut terminate = manager.request();
    terminate.put_command(Opcode::TerminateHelper).put(HELPER_UUID);
    let mut reply = broker.call(&mut manager, &terminate).await;

    // THEN: Manager gets Ok; the helper gets `[Reply][TerminateHelper][uuid]`
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    let mut forwarded = helper.recv_reply().await;
    assert_eq!(forwarded.get_command().unwrap(), Opcode::TerminateHelper);
    assert_eq!(forwarded.get::<String>().unwrap(), HELPER_UUID);
}

/// **VALUE**: Verifies stopping a helper that is not running fails.
///
/// **WHY THIS MATTERS**: The manager uses the status to update its UI.
///
/// **BUG THIS CATCHES**: Would catch `Ok` being sent with nobody to deliver to.
#[tokio::test]
async fn given_unregistered_helper_when_terminated_then_fail() {
    let mut broker = TestBroker::new();
    let mut manager = broker.connect(Role::HelperManagerClient).await;

    let mut terminate = manager.request();
    terminate.put_command(Opcode::TerminateHelper).put(HELPER_UUID);
    let mut reply = broker.call(&mut manager, &terminate).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
}

/// **VALUE**: Verifies a helper's connection closing marks it stopped.
///
/// **WHY THIS MATTERS**: A crashed helper must be startable again.
///
/// **BUG THIS CATCHES**: Would catch the helper staying `Running` with a dead
/// connection id.
#[tokio::test]
async fn given_running_helper_when_connection_closes_then_stopped() {
    let mut broker = TestBroker::new();
    let mut helper = broker.connect(Role::HelperManagerClient).await;
    let mut register = helper.request();
    register.put_command(Opcode::RegisterHelper).put(HELPER_UUID);
    broker.call(&mut helper, &register).await;

    drop(helper);
    broker.dispatcher.step().await;

    let supervisor = broker.dispatcher.supervisor();
    assert_eq!(supervisor.state(HELPER_UUID), Some(HelperState::Stopped));
    assert_eq!(supervisor.connection_of(HELPER_UUID), None);
}

/// **VALUE**: Verifies installing the same manifest twice reports a change only once.
///
/// **WHY THIS MATTERS**: Package hooks install on every upgrade; an unchanged module must
/// not trigger factory reloads in every client.
///
/// **BUG THIS CATCHES**: Would catch install always reporting a change.
#[tokio::test]
async fn given_manifest_when_installed_twice_then_second_install_unchanged() {
    // GIVEN: A manifest outside the module directories
    let mut broker = TestBroker::new();
    let manifest = broker.path().join("extra.ise");
    std::fs::write(
        &manifest,
        "[[ise]]\nname = \"Extra\"\nuuid = \"extra-1\"\nlanguage = \"de\"\n",
    )
    .unwrap();
    let mut manager = broker.connect(Role::HelperManagerClient).await;
    let path = manifest.to_string_lossy().into_owned();

    // WHEN: Installing it twice
    let mut first = manager.request();
    first.put_command(Opcode::InstallModule).put(&path);
    let mut first_reply = broker.call(&mut manager, &first).await;
    let mut second = manager.request();
    second.put_command(Opcode::InstallModule).put(&path);
    let mut second_reply = broker.call(&mut manager, &second).await;

    // THEN: Changed, then unchanged; the entry is catalogued
    assert_eq!(first_reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(first_reply.get::<u32>().unwrap(), 1);
    assert_eq!(second_reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(second_reply.get::<u32>().unwrap(), 0);
    assert!(broker.dispatcher.supervisor().catalogue().contains("extra-1"));
}

/// **VALUE**: Verifies uninstalling a module removes its ISEs and engine factories.
///
/// **WHY THIS MATTERS**: Clients must stop offering a keyboard that is gone.
///
/// **BUG THIS CATCHES**: Would catch factories surviving after their catalogue entries.
#[tokio::test]
async fn given_installed_keyboard_when_uninstalled_then_factories_gone() {
    let mut broker = TestBroker::new();
    let mut manager = broker.connect(Role::HelperManagerClient).await;
    assert_eq!(broker.dispatcher.engines().factory_count(), 2);

    let mut request = manager.request();
    request.put_command(Opcode::UninstallModule).put("raw");
    let mut reply = broker.call(&mut manager, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(reply.get::<u32>().unwrap(), 1);
    assert_eq!(broker.dispatcher.engines().factory_count(), 0);
    assert!(!broker.dispatcher.supervisor().catalogue().contains("raw-en"));
}

/// **VALUE**: Verifies an auto-restart helper that keeps crashing is relaunched until the
/// crash limit and then left down.
///
/// **WHY THIS MATTERS**: A helper broken by an upgrade must not be respawned forever.
///
/// **BUG THIS CATCHES**: Would catch auto-restart bypassing the crash-loop check.
#[tokio::test]
async fn given_auto_restart_helper_crashing_when_reaped_then_restarts_stop_at_limit() {
    // GIVEN: A helper flagged for auto-restart whose launcher always fails
    let mut broker = TestBroker::with_options(BrokerOptions {
        launcher: PathBuf::from("false"),
        helper_option: option::AUTO_RESTART,
        max_restarts: 1,
    });
    let supervisor = broker.dispatcher.supervisor_mut();
    supervisor.start_helper(HELPER_UUID).unwrap();

    // WHEN: Reaping until nothing is active any more
    let mut crashes = 0;
    for _ in 0..300 {
        crashes += supervisor
            .reap()
            .iter()
            .filter(|record| record.is_abnormal())
            .count();
        if crashes >= 2 && supervisor.active_helpers().is_empty() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // THEN: One launch plus one restart, then refused as a crash loop
    assert_eq!(crashes, 2);
    assert!(supervisor.active_helpers().is_empty());
    assert!(matches!(
        supervisor.start_helper(HELPER_UUID),
        Err(SpawnError::CrashLoop { .. })
    ));
}

/// **VALUE**: Verifies a successful `RunHelper` is not answered.
///
/// **WHY THIS MATTERS**: The launched helper announces itself with `RegisterHelper`;
/// the manager must not block on a reply that only exists for failures.
///
/// **BUG THIS CATCHES**: Would catch an `Ok` being written for every launch.
#[tokio::test]
async fn given_known_helper_when_run_then_no_reply() {
    let mut broker = TestBroker::new();
    let mut manager = broker.connect(Role::HelperManagerClient).await;

    let mut request = manager.request();
    request.put_command(Opcode::RunHelper).put(HELPER_UUID);
    manager.send(&request).await;
    broker.dispatcher.step().await;

    assert!(manager.recv_within(Duration::from_millis(100)).await.is_none());
    assert_eq!(broker.dispatcher.supervisor().active_helpers(), vec![HELPER_UUID]);
}

/// **VALUE**: Verifies launching a helper the catalogue does not know fails the request.
///
/// **WHY THIS MATTERS**: A failed launch must be reported to the requester, otherwise it
/// waits for a helper that never registers.
///
/// **BUG THIS CATCHES**: Would catch `RunHelper` swallowing launch errors.
#[tokio::test]
async fn given_unknown_helper_when_run_then_fail() {
    let mut broker = TestBroker::new();
    let mut manager = broker.connect(Role::HelperManagerClient).await;

    let mut request = manager.request();
    request.put_command(Opcode::RunHelper).put("no-such-helper");
    let mut reply = broker.call(&mut manager, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(broker.dispatcher.supervisor().active_helpers().is_empty());
}

/// **VALUE**: Verifies `RunHelper` for a crash-looping helper fails the request.
///
/// **WHY THIS MATTERS**: The manager has to learn that the helper was refused rather
/// than silently never coming up.
///
/// **BUG THIS CATCHES**: Would catch the crash-loop refusal only being logged.
#[tokio::test]
async fn given_crash_looping_helper_when_run_then_fail() {
    // GIVEN: A helper that crashed once with no restarts allowed
    let mut broker = TestBroker::with_options(BrokerOptions {
        launcher: PathBuf::from("false"),
        max_restarts: 0,
        ..BrokerOptions::default()
    });
    let supervisor = broker.dispatcher.supervisor_mut();
    supervisor.start_helper(HELPER_UUID).unwrap();
    let mut crashes = 0;
    for _ in 0..300 {
        crashes += supervisor
            .reap()
            .iter()
            .filter(|record| record.is_abnormal())
            .count();
        if crashes > 0 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(crashes, 1);
    let mut manager = broker.connect(Role::HelperManagerClient).await;

    // WHEN: The manager asks for it again
    let mut request = manager.request();
    request.put_command(Opcode::RunHelper).put(HELPER_UUID);
    let mut reply = broker.call(&mut manager, &request).await;

    // THEN: Fail, and nothing was launched
    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(broker.dispatcher.supervisor().active_helpers().is_empty());
}
