use crate::broker_tests::helpers::{RAW_UUID, TestBroker, test_limits};

use panel_core::session::Role;
use panel_core::transaction::{Opcode, Transaction};

use common::SessionKey;

use tokio::io::AsyncWriteExt;

/// **VALUE**: Verifies that a request sent before any handshake is refused and the
/// connection closed.
///
/// **WHY THIS MATTERS**: The role decides which opcodes a connection may use. A request
/// from an unclassified connection has no role to check against.
///
/// **BUG THIS CATCHES**: Would catch an unclassified connection being dispatched as if it
/// were an engine client, or left open after the rejection.
#[tokio::test]
async fn given_unclassified_connection_when_request_sent_then_fail_and_closed() {
    // GIVEN: An accepted connection that skips the handshake
    let mut broker = TestBroker::new();
    let (id, mut stream) = broker.accept_raw();
    let limits = test_limits();

    // WHEN: It sends an ordinary request with a guessed key
    let mut request = Transaction::request(&SessionKey::from_wire(1));
    request.put_command(Opcode::GetFactoryList).put("");
    request.write_to(&mut stream, &limits).await.unwrap();
    broker.dispatcher.step().await;

    // THEN: `[Reply][Fail]`, then the broker hangs up
    let mut reply = Transaction::read_from(&mut stream, &limits).await.unwrap();
    assert_eq!(reply.get_command().unwrap(), Opcode::Reply);
    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(!broker.dispatcher.registry().contains(id));
    assert!(Transaction::read_from(&mut stream, &limits).await.is_err());
}

/// **VALUE**: Verifies that a classified connection presenting the wrong key gets
/// `Fail` and stays usable.
///
/// **WHY THIS MATTERS**: The key is per connection; a client that confuses two of its
/// connections must be told, not silently served.
///
/// **BUG THIS CATCHES**: Would catch the key check being skipped once a connection is
/// classified.
#[tokio::test]
async fn given_wrong_session_key_when_requesting_then_fail_and_connection_kept() {
    // GIVEN: A handshaken engine client
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;

    // WHEN: Sending with a key that is not its own
    let wrong = SessionKey::from_wire(client.key.as_u32().wrapping_add(1));
    let mut bad = Transaction::request(&wrong);
    bad.put_command(Opcode::GetFactoryList).put("");
    let mut reply = broker.call(&mut client, &bad).await;

    // THEN: Fail, but the same connection still works with the right key
    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(broker.dispatcher.registry().contains(client.id));

    let mut good = client.request();
    good.put_command(Opcode::GetFactoryList).put("");
    let mut reply = broker.call(&mut client, &good).await;
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    let uuids = reply.get::<Vec<String>>().unwrap();
    assert!(uuids.contains(&RAW_UUID.to_string()));
}

/// **VALUE**: Verifies that opcodes are gated by the connection's role.
///
/// **WHY THIS MATTERS**: A config client creating engine instances would own instances
/// nothing ever drives or cleans up as expected.
///
/// **BUG THIS CATCHES**: Would catch the role table being ignored in dispatch.
#[tokio::test]
async fn given_config_client_when_requesting_engine_opcode_then_fail() {
    let mut broker = TestBroker::new();
    let mut config = broker.connect(Role::ConfigClient).await;

    let mut request = config.request();
    request
        .put_command(Opcode::NewInstance)
        .put(RAW_UUID)
        .put("UTF-8");
    let mut reply = broker.call(&mut config, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(broker.dispatcher.instances().is_empty());
}

/// **VALUE**: Verifies that each handshake issues a distinct connection with its own role.
///
/// **WHY THIS MATTERS**: Role lookups and key checks are per connection.
///
/// **BUG THIS CATCHES**: Would catch a second handshake reclassifying the first
/// connection.
#[tokio::test]
async fn given_two_handshakes_when_completed_then_separate_roles_and_ids() {
    let mut broker = TestBroker::new();

    let engine = broker.connect(Role::EngineClient).await;
    let manager = broker.connect(Role::HelperManagerClient).await;

    let registry = broker.dispatcher.registry();
    assert!(manager.id > engine.id);
    assert_eq!(registry.get(engine.id).unwrap().role(), Role::EngineClient);
    assert_eq!(
        registry.get(manager.id).unwrap().role(),
        Role::HelperManagerClient
    );
    assert_eq!(registry.ids_with_role(Role::EngineClient), vec![engine.id]);
}

/// **VALUE**: Verifies that `CloseConnection` is acknowledged before the broker hangs up.
///
/// **WHY THIS MATTERS**: Clients wait for the `Ok` before tearing down their own state.
///
/// **BUG THIS CATCHES**: Would catch the record being dropped before the reply is
/// written.
#[tokio::test]
async fn given_close_connection_when_handled_then_ok_then_closed() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;

    let mut request = client.request();
    request.put_command(Opcode::CloseConnection);
    let mut reply = broker.call(&mut client, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert!(!broker.dispatcher.registry().contains(client.id));
    assert!(client.is_closed().await);
}

/// **VALUE**: Verifies that `Exit` is acknowledged and flags the broker to stop.
///
/// **WHY THIS MATTERS**: Session managers stop the broker this way.
///
/// **BUG THIS CATCHES**: Would catch the exit flag being set without replying.
#[tokio::test]
async fn given_exit_request_when_handled_then_ok_and_exit_requested() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::HelperManagerClient).await;

    let mut request = client.request();
    request.put_command(Opcode::Exit);
    let mut reply = broker.call(&mut client, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert!(broker.dispatcher.exit_requested());
}

/// Declared payload length just above the test brokers' frame limit.
const OVERSIZED_LEN: u32 = 2 * 1024 * 1024;

/// **VALUE**: Verifies that an oversized frame from a classified client is failed and the
/// connection stays usable once the payload has been skipped.
///
/// **WHY THIS MATTERS**: A bad frame is a protocol error for one request, not a reason
/// to drop every instance the client owns.
///
/// **BUG THIS CATCHES**: Would catch the frame limit tearing the connection down without
/// a reply, or the stream being left mid-payload so the next header is garbage.
#[tokio::test]
async fn given_classified_client_when_frame_exceeds_limit_then_fail_and_stream_resyncs() {
    // GIVEN: A handshaken engine client with one instance
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let instance = broker.new_instance(&mut client, RAW_UUID).await;

    // WHEN: It announces a frame above the limit
    client
        .stream
        .write_all(&OVERSIZED_LEN.to_le_bytes())
        .await
        .unwrap();
    broker.dispatcher.step().await;

    // THEN: `[Reply][Fail]` and nothing was torn down
    let mut reply = client.recv_reply().await;
    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(broker.dispatcher.registry().contains(client.id));
    assert_eq!(broker.dispatcher.instances().instances_of(client.id).len(), 1);

    // WHEN: The payload follows, then an ordinary request
    let payload = vec![0u8; OVERSIZED_LEN as usize];
    client.stream.write_all(&payload).await.unwrap();
    let mut request = client.request();
    request.put_command(Opcode::DeleteInstance).put(&instance);
    let mut reply = broker.call(&mut client, &request).await;

    // THEN: The request is read from the right offset and served
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert!(broker.dispatcher.instances().is_empty());
}

/// **VALUE**: Verifies that an oversized first frame fails the handshake and closes the
/// connection.
///
/// **WHY THIS MATTERS**: Nothing but a handshake may come first; a connection that opens
/// with garbage has no role to keep.
///
/// **BUG THIS CATCHES**: Would catch the resync path keeping unclassified connections
/// alive.
#[tokio::test]
async fn given_unclassified_connection_when_frame_exceeds_limit_then_fail_and_closed() {
    let mut broker = TestBroker::new();
    let (id, mut stream) = broker.accept_raw();
    let limits = test_limits();

    stream.write_all(&OVERSIZED_LEN.to_le_bytes()).await.unwrap();
    broker.dispatcher.step().await;

    let mut reply = Transaction::read_from(&mut stream, &limits).await.unwrap();
    assert_eq!(reply.get_command().unwrap(), Opcode::Reply);
    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(!broker.dispatcher.registry().contains(id));
}
