use crate::SessionKey;

/// **VALUE**: Verifies that session keys never leak through Debug or Display.
///
/// **WHY THIS MATTERS**: Connection records are logged on accept, handshake and teardown.
/// A key printed into `panel.log` would let any local process impersonate that connection.
///
/// **BUG THIS CATCHES**: Would catch a `#[derive(Debug)]` sneaking back onto `SessionKey`.
#[test]
fn given_session_key_when_formatted_then_value_is_redacted() {
    // GIVEN: A key with a known value
    let key = SessionKey::from_wire(0xDEAD_BEEF);

    // WHEN: Formatting it both ways
    let debug = format!("{key:?}");
    let display = format!("{key}");

    // THEN: Neither output contains the value
    assert!(!debug.contains("3735928559"), "Debug must not show the key");
    assert!(!debug.to_lowercase().contains("deadbeef"));
    assert!(debug.contains("REDACTED"));
    assert!(display.contains("REDACTED"));
}

/// **VALUE**: Verifies that generated keys are never zero.
///
/// **WHY THIS MATTERS**: Zero is what an uninitialised client would send; accepting it
/// would make the key check pass for peers that skipped the handshake.
///
/// **BUG THIS CATCHES**: Would catch removal of the non-zero retry loop in `generate()`.
#[test]
fn given_many_generated_keys_when_inspected_then_none_is_zero() {
    // GIVEN / WHEN: A batch of generated keys
    let keys: Vec<SessionKey> = (0..256).map(|_| SessionKey::generate()).collect();

    // THEN: None of them is zero
    assert!(keys.iter().all(|key| key.as_u32() != 0));
}

/// **VALUE**: Verifies key comparison against a presented wire value.
///
/// **WHY THIS MATTERS**: `matches()` is the only gate between a classified connection
/// and the dispatcher.
///
/// **BUG THIS CATCHES**: Would catch an inverted or always-true comparison.
#[test]
fn given_key_when_matching_then_only_exact_value_passes() {
    // GIVEN: A key
    let key = SessionKey::from_wire(42);

    // WHEN / THEN: Only the exact value matches
    assert!(key.matches(42));
    assert!(!key.matches(41));
    assert!(!key.matches(0));
}

/// **VALUE**: Verifies that serializing a key through serde fails loudly.
///
/// **WHY THIS MATTERS**: Config and catalogue structs are serialized to disk; a key
/// accidentally embedded in one must not be written out.
///
/// **BUG THIS CATCHES**: Would catch a derived `Serialize` replacing the refusing impl.
#[test]
fn given_session_key_when_serialized_then_returns_error() {
    // GIVEN: A key
    let key = SessionKey::from_wire(7);

    // WHEN: Serializing it
    let result = serde_json::to_string(&key);

    // THEN: Serialization is refused with the redaction error
    let message = result.expect_err("SessionKey must not serialize").to_string();
    assert!(message.contains("SessionKey is never serialized"), "got: {message}");
}
