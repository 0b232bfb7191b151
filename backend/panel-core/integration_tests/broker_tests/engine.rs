use crate::broker_tests::helpers::{RAW_UUID, TestBroker, key_request};

use panel_core::engine::Callback;
use panel_core::session::{InstanceId, Role};
use panel_core::transaction::Opcode;

use models::KeyEvent;
use models::key_event::mask;

/// **VALUE**: Verifies the plain engine path: create an instance, send a key, get the
/// commit callback ahead of the final status.
///
/// **WHY THIS MATTERS**: Clients apply callbacks in reply order and treat the status as
/// the end of the reply.
///
/// **BUG THIS CATCHES**: Would catch callbacks being appended after `Ok`, where the
/// client never reads them.
#[tokio::test]
async fn given_instance_when_key_processed_then_commit_callback_then_ok() {
    // GIVEN: An engine client with one raw instance
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let instance = broker.new_instance(&mut client, RAW_UUID).await;

    // WHEN: Typing 'a'
    let request = key_request(&client, instance, 'a');
    let mut reply = broker.call(&mut client, &request).await;

    // THEN: CommitString for that instance, then Ok with the key consumed
    let opcode = reply.get_command().unwrap();
    let (target, callback) = Callback::decode(opcode, &mut reply).unwrap();
    assert_eq!(target, InstanceId::new(instance));
    assert_eq!(callback, Callback::CommitString("a".to_string()));
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(reply.get::<u32>().unwrap(), 1);
    assert!(!reply.has_remaining());
}

/// **VALUE**: Verifies a key the engine declines is answered `Ok` with consumed = 0.
///
/// **WHY THIS MATTERS**: The application handles declined keys itself (shortcuts,
/// navigation); it must be able to tell them apart from a failed request.
///
/// **BUG THIS CATCHES**: Would catch a declined key being reported as `Fail`.
#[tokio::test]
async fn given_shortcut_key_when_processed_then_ok_not_consumed() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let instance = broker.new_instance(&mut client, RAW_UUID).await;

    let mut request = client.request();
    request
        .put_command(Opcode::ProcessKeyEvent)
        .put(&instance)
        .put(&KeyEvent::new(u32::from('c'), mask::CONTROL));
    let mut reply = broker.call(&mut client, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(reply.get::<u32>().unwrap(), 0);
    assert!(!reply.has_remaining());
}

/// **VALUE**: Verifies one connection cannot drive or delete another's instance.
///
/// **WHY THIS MATTERS**: Instance ids are small integers any client can guess.
///
/// **BUG THIS CATCHES**: Would catch the ownership check being done on the instance id
/// alone.
#[tokio::test]
async fn given_foreign_instance_when_driven_then_fail() {
    // GIVEN: A owns an instance; B does not
    let mut broker = TestBroker::new();
    let mut owner = broker.connect(Role::EngineClient).await;
    let mut other = broker.connect(Role::EngineClient).await;
    let instance = broker.new_instance(&mut owner, RAW_UUID).await;

    // WHEN: B sends a key to it and then tries to delete it
    let request = key_request(&other, instance, 'x');
    let mut key_reply = broker.call(&mut other, &request).await;
    let mut delete = other.request();
    delete.put_command(Opcode::DeleteInstance).put(&instance);
    let mut delete_reply = broker.call(&mut other, &delete).await;

    // THEN: Both fail and A still owns the instance
    assert_eq!(key_reply.get_command().unwrap(), Opcode::Fail);
    assert_eq!(delete_reply.get_command().unwrap(), Opcode::Fail);
    assert_eq!(
        broker.dispatcher.instances().owner_of(InstanceId::new(instance)),
        Some(owner.id)
    );
}

/// **VALUE**: Verifies a disconnect destroys exactly the instances of that connection.
///
/// **WHY THIS MATTERS**: Applications crash; their engine state must not leak, and other
/// applications' instances must survive.
///
/// **BUG THIS CATCHES**: Would catch bulk removal taking a neighbouring connection's
/// instances, or leaving engine objects alive after the ownership pairs are gone.
#[tokio::test]
async fn given_two_clients_when_one_disconnects_then_only_its_instances_destroyed() {
    // GIVEN: A with two instances, B with one
    let mut broker = TestBroker::new();
    let mut a = broker.connect(Role::EngineClient).await;
    let mut b = broker.connect(Role::EngineClient).await;
    broker.new_instance(&mut a, RAW_UUID).await;
    let kept = broker.new_instance(&mut b, RAW_UUID).await;
    broker.new_instance(&mut a, RAW_UUID).await;
    let a_id = a.id;

    // WHEN: A goes away
    drop(a);
    broker.dispatcher.step().await;

    // THEN: Only B's instance is left, in both the repository and the host
    let instances = broker.dispatcher.instances();
    assert!(instances.instances_of(a_id).is_empty());
    assert_eq!(instances.instances_of(b.id), vec![InstanceId::new(kept)]);
    assert_eq!(broker.dispatcher.engines().instance_count(), 1);
    assert!(!broker.dispatcher.registry().contains(a_id));
}

/// **VALUE**: Verifies several commands in one frame are answered in one reply.
///
/// **WHY THIS MATTERS**: Clients batch focus and reset calls into a single request.
///
/// **BUG THIS CATCHES**: Would catch the dispatcher stopping after the first command.
#[tokio::test]
async fn given_batched_commands_when_dispatched_then_statuses_in_order() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;
    let instance = broker.new_instance(&mut client, RAW_UUID).await;

    let mut request = client.request();
    request
        .put_command(Opcode::FocusIn)
        .put(&instance)
        .put_command(Opcode::GetFactoryName)
        .put(RAW_UUID);
    let mut reply = broker.call(&mut client, &request).await;

    // FocusIn registers the engine's property, then Ok; then the name
    let opcode = reply.get_command().unwrap();
    let (_, callback) = Callback::decode(opcode, &mut reply).unwrap();
    assert!(matches!(callback, Callback::RegisterProperties(ref props) if props.len() == 1));
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(reply.get::<String>().unwrap(), "Raw English");
}

/// **VALUE**: Verifies an unknown factory uuid fails without creating anything.
///
/// **WHY THIS MATTERS**: Clients fall back to another ISE on `Fail`.
///
/// **BUG THIS CATCHES**: Would catch an ownership pair being recorded for a failed
/// creation.
#[tokio::test]
async fn given_unknown_uuid_when_creating_instance_then_fail_and_nothing_recorded() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::EngineClient).await;

    let mut request = client.request();
    request
        .put_command(Opcode::NewInstance)
        .put("no-such-ise")
        .put("UTF-8");
    let mut reply = broker.call(&mut client, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(broker.dispatcher.instances().is_empty());
}
