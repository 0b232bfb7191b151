use crate::broker_tests::helpers::{RAW_UUID, TestBroker, test_limits};

use panel_core::server::bind_socket;
use panel_core::session::{Role, open_connection};
use panel_core::transaction::{Opcode, Transaction};

use std::future::pending;
use std::time::Duration;

use tokio::net::UnixStream;
use tokio::sync::oneshot;
use tokio::time::timeout;

const REAP_INTERVAL: Duration = Duration::from_millis(50);
const RUN_DEADLINE: Duration = Duration::from_secs(5);

/// **VALUE**: Verifies the full serve loop accepts a connection, handshakes it, and stops
/// after acknowledging `Exit`.
///
/// **WHY THIS MATTERS**: Every other broker test drives single events; this is the loop
/// the daemon actually runs.
///
/// **BUG THIS CATCHES**: Would catch the accept arm not registering connections, or the
/// loop ignoring the exit flag.
#[tokio::test]
async fn given_listening_dispatcher_when_client_sends_exit_then_run_returns() {
    // GIVEN: A dispatcher serving a bound socket
    let TestBroker { dir, dispatcher } = TestBroker::new();
    let path = dir.path().join("panel.sock");
    let listener = bind_socket(&path).await.unwrap();
    let limits = test_limits();

    let client = async {
        let mut stream = UnixStream::connect(&path).await.unwrap();
        let key = open_connection(&mut stream, Role::HelperManagerClient, &limits)
            .await
            .unwrap();

        // WHEN: The client asks the broker to exit
        let mut request = Transaction::request(&key);
        request.put_command(Opcode::Exit);
        request.write_to(&mut stream, &limits).await.unwrap();
        let mut reply = Transaction::read_from(&mut stream, &limits).await.unwrap();
        (reply.get_command().unwrap(), reply.get_command().unwrap())
    };

    let (served, (marker, status)) = timeout(RUN_DEADLINE, async {
        tokio::join!(
            dispatcher.run(listener, None, REAP_INTERVAL, pending()),
            client
        )
    })
    .await
    .unwrap();

    // THEN: `[Reply][Ok]`, and the loop ends by itself
    assert_eq!(marker, Opcode::Reply);
    assert_eq!(status, Opcode::Ok);
    assert!(served.is_ok());
}

/// **VALUE**: Verifies the shutdown future stops the loop and closes client connections.
///
/// **WHY THIS MATTERS**: SIGTERM reaches the broker through this future; clients must
/// see their connection end rather than hang.
///
/// **BUG THIS CATCHES**: Would catch shutdown leaving connections open after `run`
/// returns.
#[tokio::test]
async fn given_serving_dispatcher_when_shutdown_resolves_then_clients_disconnected() {
    let TestBroker { dir, dispatcher } = TestBroker::new();
    let path = dir.path().join("panel.sock");
    let listener = bind_socket(&path).await.unwrap();
    let limits = test_limits();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();

    let client = async move {
        let mut stream = UnixStream::connect(&path).await.unwrap();
        let key = open_connection(&mut stream, Role::EngineClient, &limits)
            .await
            .unwrap();
        let mut request = Transaction::request(&key);
        request
            .put_command(Opcode::NewInstance)
            .put(RAW_UUID)
            .put("UTF-8");
        request.write_to(&mut stream, &limits).await.unwrap();
        let mut reply = Transaction::read_from(&mut stream, &limits).await.unwrap();
        assert_eq!(reply.get_command().unwrap(), Opcode::Reply);
        assert_eq!(reply.get_command().unwrap(), Opcode::Ok);

        let _ = stop_tx.send(());
        Transaction::read_from(&mut stream, &limits).await.is_err()
    };

    let (served, closed) = timeout(RUN_DEADLINE, async {
        tokio::join!(
            dispatcher.run(listener, None, REAP_INTERVAL, async move {
                let _ = stop_rx.await;
            }),
            client
        )
    })
    .await
    .unwrap();

    assert!(served.is_ok());
    assert!(closed);
}
