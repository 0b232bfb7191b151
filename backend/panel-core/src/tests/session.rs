use crate::PANEL_SERVER_NAME;
use crate::error::ipc::IpcError;
use crate::session::handshake::{accept_reply, reject_reply};
use crate::session::{
    ConnectionId, ConnectionRecord, ConnectionRegistry, HandshakeRequest, Role, open_connection,
};
use crate::transaction::{FrameLimits, Opcode, Transaction};

use common::SessionKey;

use std::os::fd::AsRawFd;

use tokio::net::UnixStream;

/// **VALUE**: Verifies each classified role resolves from its own wire name.
///
/// **WHY THIS MATTERS**: Clients built against other versions spell roles as strings; a
/// rename on either side locks that client type out.
///
/// **BUG THIS CATCHES**: Would catch `Unclassified` becoming selectable by name.
#[test]
fn given_role_wire_names_when_resolved_then_only_classified_roles_match() {
    for role in Role::CLASSIFIED {
        assert_eq!(Role::from_wire_name(role.wire_name()), Some(role));
    }
    assert_eq!(Role::from_wire_name(Role::Unclassified.wire_name()), None);
    assert_eq!(Role::from_wire_name("root"), None);
}

/// **VALUE**: Verifies a well formed handshake parses to its role.
///
/// **WHY THIS MATTERS**: This is the only path from unclassified to a working client.
///
/// **BUG THIS CATCHES**: Would catch argument order drift between writer and parser.
#[test]
fn given_valid_open_connection_when_parsed_then_role_extracted() {
    // GIVEN: A config-client handshake
    let mut trans = HandshakeRequest::new(Role::ConfigClient).to_transaction();

    // WHEN: Parsing it
    let parsed = HandshakeRequest::parse(&mut trans).unwrap();

    // THEN: Role and server name come through
    assert_eq!(parsed.role, Role::ConfigClient);
    assert_eq!(parsed.expected_server, PANEL_SERVER_NAME);
}

/// **VALUE**: Verifies that a request other than `OpenConnection` is refused as a handshake.
///
/// **WHY THIS MATTERS**: Unclassified connections must not reach any handler.
///
/// **BUG THIS CATCHES**: Would catch the opcode check being skipped.
#[test]
fn given_command_before_open_connection_when_parsed_then_handshake_error() {
    // GIVEN: A NewInstance request from an unclassified peer
    let mut trans = Transaction::new();
    trans.put_command(Opcode::Request).put_command(Opcode::NewInstance);

    // WHEN / THEN: Rejected
    assert!(matches!(
        HandshakeRequest::parse(&mut trans),
        Err(IpcError::Handshake { .. })
    ));
}

/// **VALUE**: Verifies that handshakes for another server name are refused.
///
/// **WHY THIS MATTERS**: Two brokers can share a socket directory; a client must never
/// silently talk to the wrong one.
///
/// **BUG THIS CATCHES**: Would catch the server name being parsed but not compared.
#[test]
fn given_wrong_server_name_when_parsed_then_handshake_error() {
    // GIVEN: A handshake naming another server
    let mut request = HandshakeRequest::new(Role::EngineClient);
    request.expected_server = "some-other-broker".to_string();
    let mut trans = request.to_transaction();

    // WHEN / THEN: Rejected
    assert!(matches!(
        HandshakeRequest::parse(&mut trans),
        Err(IpcError::Handshake { .. })
    ));
}

/// **VALUE**: Verifies unknown role names are refused.
///
/// **WHY THIS MATTERS**: An unknown role has no handler permissions and would be a
/// connection stuck in limbo.
///
/// **BUG THIS CATCHES**: Would catch a fallback to a default role.
#[test]
fn given_unknown_role_when_parsed_then_handshake_error() {
    // GIVEN: A handshake with an invented role
    let mut trans = Transaction::new();
    trans
        .put_command(Opcode::Request)
        .put_command(Opcode::OpenConnection)
        .put("superuser")
        .put(PANEL_SERVER_NAME);

    // WHEN / THEN: Rejected
    assert!(matches!(
        HandshakeRequest::parse(&mut trans),
        Err(IpcError::Handshake { .. })
    ));
}

/// **VALUE**: Verifies the client side returns the key the broker issued.
///
/// **WHY THIS MATTERS**: Every later request carries this key; getting it wrong makes
/// every request fail.
///
/// **BUG THIS CATCHES**: Would catch the client reading the status as the key.
#[tokio::test]
async fn given_accepting_broker_when_opening_connection_then_issued_key_returned() {
    // GIVEN: A fake broker that accepts with key 4242
    let (mut client, mut server) = UnixStream::pair().unwrap();
    let limits = FrameLimits::default();
    let broker = async {
        let mut request = Transaction::read_from(&mut server, &limits).await.unwrap();
        let parsed = HandshakeRequest::parse(&mut request).unwrap();
        accept_reply(&SessionKey::from_wire(4242))
            .write_to(&mut server, &limits)
            .await
            .unwrap();
        parsed.role
    };

    // WHEN: Opening a connection as a helper manager
    let (key, role) = tokio::join!(
        open_connection(&mut client, Role::HelperManagerClient, &limits),
        broker
    );

    // THEN: The key matches and the broker saw the right role
    assert!(key.unwrap().matches(4242));
    assert_eq!(role, Role::HelperManagerClient);
}

/// **VALUE**: Verifies a rejected handshake is an error on the client side.
///
/// **WHY THIS MATTERS**: Clients must not carry on with a connection the broker closed.
///
/// **BUG THIS CATCHES**: Would catch `Fail` being treated like `Ok` with a zero key.
#[tokio::test]
async fn given_rejecting_broker_when_opening_connection_then_handshake_error() {
    // GIVEN: A fake broker that rejects
    let (mut client, mut server) = UnixStream::pair().unwrap();
    let limits = FrameLimits::default();
    let broker = async {
        Transaction::read_from(&mut server, &limits).await.unwrap();
        reject_reply().write_to(&mut server, &limits).await.unwrap();
    };

    // WHEN: Opening a connection
    let (result, ()) = tokio::join!(
        open_connection(&mut client, Role::EngineClient, &limits),
        broker
    );

    // THEN: Handshake error
    assert!(matches!(result, Err(IpcError::Handshake { .. })));
}

fn record() -> (ConnectionRecord, UnixStream) {
    let (ours, theirs) = UnixStream::pair().unwrap();
    let fd = ours.as_raw_fd();
    let (_read, write) = ours.into_split();
    let reader = tokio::spawn(async {});
    (ConnectionRecord::new(write, reader, fd), theirs)
}

/// **VALUE**: Verifies connection ids are never handed out twice.
///
/// **WHY THIS MATTERS**: Descriptor numbers are reused by the OS; ids are what keep a
/// stale instance from being attributed to a new client on the same fd.
///
/// **BUG THIS CATCHES**: Would catch ids derived from the descriptor again.
#[tokio::test]
async fn given_removed_connection_when_allocating_again_then_new_id_differs() {
    // GIVEN: A registry with one connection inserted then removed
    let mut registry = ConnectionRegistry::new();
    let first = registry.allocate_id();
    let (rec, _peer) = record();
    registry.insert(first, rec);
    registry.remove(first);

    // WHEN: Allocating another id
    let second = registry.allocate_id();

    // THEN: It is a different id
    assert_ne!(first, second);
    assert!(second > first);
}

/// **VALUE**: Verifies classification sets the role and key exactly once.
///
/// **WHY THIS MATTERS**: A second `OpenConnection` must not swap a client's role.
///
/// **BUG THIS CATCHES**: Would catch reclassification being allowed.
#[tokio::test]
async fn given_classified_connection_when_classified_again_then_error() {
    // GIVEN: A connection classified as engine client
    let mut registry = ConnectionRegistry::new();
    let id = registry.allocate_id();
    let (rec, _peer) = record();
    registry.insert(id, rec);
    registry
        .classify(id, Role::EngineClient, SessionKey::from_wire(7))
        .unwrap();

    // WHEN: Classifying again
    let again = registry.classify(id, Role::ConfigClient, SessionKey::from_wire(8));

    // THEN: Refused, original role and key kept
    assert!(again.is_err());
    let record = registry.get(id).unwrap();
    assert_eq!(record.role(), Role::EngineClient);
    assert!(record.key_matches(7));
    assert!(!record.key_matches(8));
}

/// **VALUE**: Verifies an unclassified connection matches no key at all.
///
/// **WHY THIS MATTERS**: Without a key there is nothing to compare; accepting anything
/// would let requests bypass the handshake.
///
/// **BUG THIS CATCHES**: Would catch `key_matches` returning true for a missing key.
#[tokio::test]
async fn given_unclassified_connection_when_checking_key_then_never_matches() {
    let mut registry = ConnectionRegistry::new();
    let id = registry.allocate_id();
    let (rec, _peer) = record();
    registry.insert(id, rec);

    let record = registry.get(id).unwrap();
    assert!(!record.is_classified());
    assert!(!record.key_matches(0));
    assert_eq!(registry.ids_with_role(Role::Unclassified), vec![id]);
}

/// **VALUE**: Verifies sending to an unknown connection reports it as closed.
///
/// **WHY THIS MATTERS**: Callbacks can target a connection torn down a moment earlier.
///
/// **BUG THIS CATCHES**: Would catch a panic on a missing registry entry.
#[tokio::test]
async fn given_unknown_connection_when_sending_then_closed_error() {
    let mut registry = ConnectionRegistry::new();
    let result = registry
        .send(ConnectionId::new(99), &Transaction::reply(), &FrameLimits::default())
        .await;
    assert!(result.is_err_and(|e| e.is_transport()));
}
