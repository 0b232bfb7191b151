use crate::broker_tests::helpers::{CAPS_UUID, Client, RAW_UUID, TestBroker, key_request};

use panel_core::engine::Callback;
use panel_core::session::Role;
use panel_core::transaction::{Opcode, Transaction};

use std::time::Duration;

/// Read a `Continue` frame and check it asks for surrounding text of `instance`.
async fn expect_surrounding_text_query(client: &mut Client, instance: u32) {
    let mut frame = client.recv_reply().await;
    assert_eq!(frame.get_command().unwrap(), Opcode::Continue);
    assert_eq!(frame.get_command().unwrap(), Opcode::GetSurroundingText);
    assert_eq!(frame.get::<u32>().unwrap(), instance);
    frame.get::<u32>().unwrap();
    frame.get::<u32>().unwrap();
    assert!(!frame.has_remaining());
}

fn surrounding_text_answer(client: &Client, text: &str, cursor: u32) -> Transaction {
    let mut answer = client.request();
    answer
        .put_command(Opcode::GetSurroundingText)
        .put(text)
        .put(&cursor);
    answer
}

/// Decode the single commit of a final reply and check the status after it.
fn committed_text(mut reply: Transaction) -> String {
    let opcode = reply.get_command().unwrap();
    let (_, callback) = Callback::decode(opcode, &mut reply).unwrap();
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    match callback {
        Callback::CommitString(text) => text,
        other => panic!("expected a commit, got {other:?}"),
    }
}

/// **VALUE**: Verifies the full continuation round trip: the broker asks the client for
/// surrounding text mid-request, uses the answer, and finishes the original request.
///
/// **WHY THIS MATTERS**: This is the only place the protocol reverses direction; both
/// sides must agree on framing and on which frame is the answer.
///
/// **BUG THIS CATCHES**: Would catch the inbound cursor not being restored after the
/// answer, the answer being parsed as a new request, or the final reply missing.
#[tokio::test]
async fn given_capitalising_instance_when_key_needs_context_then_continue_then_final_reply() {
    // GIVEN: A capitalising instance
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let instance = broker.new_instance(&mut client, CAPS_UUID).await;

    // WHEN: Typing 'n' right after a full stop, answering the query
    client.send(&key_request(&client, instance, 'n')).await;
    let answer = surrounding_text_answer(&client, "Done. ", 6);
    tokio::join!(broker.dispatcher.step(), async {
        expect_surrounding_text_query(&mut client, instance).await;
        client.send(&answer).await;
    });

    // THEN: The final reply commits the capital
    let reply = client.recv_reply().await;
    assert_eq!(committed_text(reply), "N");
}

/// **VALUE**: Verifies that a client disconnecting during a continuation gets no reply
/// and is torn down with its instances.
///
/// **WHY THIS MATTERS**: The dispatcher is blocked on that client; it must notice the
/// close instead of waiting for an answer that cannot come.
///
/// **BUG THIS CATCHES**: Would catch the dispatcher writing a reply to a closed
/// connection or leaving its instances behind.
#[tokio::test]
async fn given_pending_continuation_when_client_disconnects_then_no_reply_and_teardown() {
    // GIVEN: A key that triggers a query
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let id = client.id;
    let instance = broker.new_instance(&mut client, CAPS_UUID).await;
    client.send(&key_request(&client, instance, 'n')).await;

    // WHEN: The client reads the query and hangs up
    tokio::join!(broker.dispatcher.step(), async move {
        expect_surrounding_text_query(&mut client, instance).await;
        drop(client);
    });

    // THEN: Connection and instance are gone
    assert!(!broker.dispatcher.registry().contains(id));
    assert!(broker.dispatcher.instances().is_empty());
    assert_eq!(broker.dispatcher.engines().instance_count(), 0);
}

/// **VALUE**: Verifies that a client that never answers is treated as disconnected after
/// the socket timeout.
///
/// **WHY THIS MATTERS**: A hung application would otherwise freeze input for every
/// other application.
///
/// **BUG THIS CATCHES**: Would catch the continuation wait having no deadline.
#[tokio::test]
async fn given_pending_continuation_when_client_stays_silent_then_torn_down_after_timeout() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let id = client.id;
    let instance = broker.new_instance(&mut client, CAPS_UUID).await;
    client.send(&key_request(&client, instance, 'n')).await;

    tokio::join!(
        broker.dispatcher.step(),
        expect_surrounding_text_query(&mut client, instance)
    );

    assert!(!broker.dispatcher.registry().contains(id));
    assert!(client.is_closed().await);
}

/// **VALUE**: Verifies that requests from other connections wait until the continuation
/// finishes and are then served in arrival order.
///
/// **WHY THIS MATTERS**: Engines are not re-entrant; serving B while A's request is half
/// done would interleave their effects.
///
/// **BUG THIS CATCHES**: Would catch deferred events being dropped, or being served
/// before the continuation completes.
#[tokio::test]
async fn given_continuation_in_progress_when_other_client_requests_then_deferred_until_done() {
    // GIVEN: A with a capitalising instance, B with a plain one
    let mut broker = TestBroker::new();
    let mut a = broker.connect(Role::EngineClient).await;
    let mut b = broker.connect(Role::EngineClient).await;
    let a_instance = broker.new_instance(&mut a, CAPS_UUID).await;
    let b_instance = broker.new_instance(&mut b, RAW_UUID).await;

    // WHEN: B sends a key while A's request waits for its answer
    a.send(&key_request(&a, a_instance, 'n')).await;
    let answer = surrounding_text_answer(&a, "Done. ", 6);
    let b_request = key_request(&b, b_instance, 'b');
    tokio::join!(broker.dispatcher.step(), async {
        expect_surrounding_text_query(&mut a, a_instance).await;
        b.send(&b_request).await;
        assert!(
            b.recv_within(Duration::from_millis(50)).await.is_none(),
            "B must not be served during A's continuation"
        );
        a.send(&answer).await;
    });

    // THEN: A completes first, then B is served by the next step
    assert_eq!(committed_text(a.recv_reply().await), "N");
    broker.dispatcher.step().await;
    assert_eq!(committed_text(b.recv_reply().await), "b");
}

/// **VALUE**: Verifies that a second request on the same connection, sent while the first
/// waits for its query answer, is only served after the first completes.
///
/// **WHY THIS MATTERS**: Clients pipeline requests; a request slipped in ahead of the
/// answer must neither be mistaken for it nor overtake the request it follows.
///
/// **BUG THIS CATCHES**: Would catch the pipelined frame being dropped, answered early,
/// or taken as the query answer.
#[tokio::test]
async fn given_pipelined_request_during_continuation_when_answered_then_served_in_order() {
    // GIVEN: A capitalising instance
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let instance = broker.new_instance(&mut client, CAPS_UUID).await;

    // WHEN: A second request follows the key before the query is answered
    client.send(&key_request(&client, instance, 'n')).await;
    let mut second = client.request();
    second.put_command(Opcode::GetFactoryName).put(RAW_UUID);
    let answer = surrounding_text_answer(&client, "Done. ", 6);
    tokio::join!(broker.dispatcher.step(), async {
        expect_surrounding_text_query(&mut client, instance).await;
        client.send(&second).await;
        assert!(
            client.recv_within(Duration::from_millis(50)).await.is_none(),
            "the second request must wait for the answer"
        );
        client.send(&answer).await;
    });

    // THEN: The key's final reply comes first, then the second request is served
    assert_eq!(committed_text(client.recv_reply().await), "N");
    broker.dispatcher.step().await;
    let mut reply = client.recv_reply().await;
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(reply.get::<String>().unwrap(), "Raw English");
}
