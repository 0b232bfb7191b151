use crate::broker_tests::helpers::TestBroker;

use panel_core::config::ConfigStore;
use panel_core::session::Role;
use panel_core::transaction::Opcode;

/// **VALUE**: Verifies a config client can set, read back, and flush values.
///
/// **WHY THIS MATTERS**: Every panel setting goes through this path; a flush that does
/// not reach the file loses the user's preferences on restart.
///
/// **BUG THIS CATCHES**: Would catch set values being held only in the request scope, or
/// flush writing somewhere other than the store path.
#[tokio::test]
async fn given_config_client_when_set_get_flush_then_value_persisted() {
    // GIVEN: A config client
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::ConfigClient).await;

    // WHEN: Setting a string and an int, reading the string, then flushing
    let mut set = client.request();
    set.put_command(Opcode::SetConfigString)
        .put("/panel/font")
        .put("Sans 12")
        .put_command(Opcode::SetConfigInt)
        .put("/panel/size")
        .put(&(-3i32 as u32));
    let mut set_reply = broker.call(&mut client, &set).await;

    let mut get = client.request();
    get.put_command(Opcode::GetConfigString).put("/panel/font");
    let mut get_reply = broker.call(&mut client, &get).await;

    let mut flush = client.request();
    flush.put_command(Opcode::FlushConfig);
    let mut flush_reply = broker.call(&mut client, &flush).await;

    // THEN: Both sets acknowledged, value read back, file holds both with signs intact
    assert_eq!(set_reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(set_reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(get_reply.get_command().unwrap(), Opcode::Ok);
    assert_eq!(get_reply.get::<String>().unwrap(), "Sans 12");
    assert_eq!(flush_reply.get_command().unwrap(), Opcode::Ok);

    let on_disk = ConfigStore::open(broker.path().join("store.json")).unwrap();
    assert_eq!(on_disk.get_string("/panel/font"), Some("Sans 12"));
    assert_eq!(on_disk.get_int("/panel/size"), Some(-3));
}

/// **VALUE**: Verifies typed reads of a missing or differently typed key fail.
///
/// **WHY THIS MATTERS**: Clients fall back to their built-in default on `Fail`.
///
/// **BUG THIS CATCHES**: Would catch `Ok` with a zero value for a missing key.
#[tokio::test]
async fn given_string_key_when_read_as_bool_or_missing_then_fail() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::ConfigClient).await;
    let mut set = client.request();
    set.put_command(Opcode::SetConfigString).put("/k").put("yes");
    broker.call(&mut client, &set).await;

    let mut request = client.request();
    request.put_command(Opcode::GetConfigBool).put("/k");
    let mut wrong_type = broker.call(&mut client, &request).await;
    let mut request = client.request();
    request.put_command(Opcode::GetConfigString).put("/missing");
    let mut missing = broker.call(&mut client, &request).await;

    assert_eq!(wrong_type.get_command().unwrap(), Opcode::Fail);
    assert_eq!(missing.get_command().unwrap(), Opcode::Fail);
}

/// **VALUE**: Verifies a malformed argument fails the command and skips the rest of
/// the frame.
///
/// **WHY THIS MATTERS**: After a decode error the position of the next command is
/// unknown; carrying on would misread arguments as opcodes.
///
/// **BUG THIS CATCHES**: Would catch the dispatcher continuing after a malformed
/// command.
#[tokio::test]
async fn given_malformed_set_when_batched_then_fail_and_rest_skipped() {
    let mut broker = TestBroker::new();
    let mut client = broker.connect(Role::ConfigClient).await;

    // SetConfigInt with a string where the Uint32 belongs, then a valid set
    let mut request = client.request();
    request
        .put_command(Opcode::SetConfigInt)
        .put("/k")
        .put("not a number")
        .put_command(Opcode::SetConfigString)
        .put("/after")
        .put("v");
    let mut reply = broker.call(&mut client, &request).await;

    assert_eq!(reply.get_command().unwrap(), Opcode::Fail);
    assert!(!reply.has_remaining());
    assert_eq!(broker.dispatcher.store().get_string("/after"), None);
}
