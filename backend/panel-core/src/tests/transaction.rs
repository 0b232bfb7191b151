use crate::error::codec::CodecError;
use crate::transaction::{FieldTag, Opcode, Transaction, WideString};

use models::{Attribute, Candidate, KeyEvent, LookupTable, Property};

/// **VALUE**: Verifies that mixed fields come back out in write order with their values.
///
/// **WHY THIS MATTERS**: Every handler reads its arguments positionally; a codec that
/// reorders or truncates fields silently hands engines the wrong data.
///
/// **BUG THIS CATCHES**: Would catch a length prefix written in the wrong width or an
/// off-by-one in cursor advancement after a variable-sized field.
#[test]
fn given_mixed_fields_when_read_back_in_order_then_values_match() {
    // GIVEN: A transaction with one field of several kinds
    let mut table = LookupTable::new(5);
    table.append(Candidate::new("候补"));
    table.append(Candidate::new("b"));
    let attrs = vec![Attribute::underline(0, 2)];
    let mut trans = Transaction::new();
    trans
        .put_command(Opcode::Request)
        .put(&7u32)
        .put("plain")
        .put(&WideString::new("wïde"))
        .put(&attrs)
        .put(&table)
        .put(&KeyEvent::from_char('q'))
        .put(&vec!["a".to_string(), "b".to_string()])
        .put(&vec![1u32, 2, 3])
        .put(&Property::new("/mode", "Mode"));

    // WHEN: Reading everything back with the same types
    // THEN: Each value matches what was written
    assert_eq!(trans.get_command().unwrap(), Opcode::Request);
    assert_eq!(trans.get::<u32>().unwrap(), 7);
    assert_eq!(trans.get::<String>().unwrap(), "plain");
    assert_eq!(trans.get::<WideString>().unwrap(), WideString::new("wïde"));
    assert_eq!(trans.get::<Vec<Attribute>>().unwrap(), attrs);
    assert_eq!(trans.get::<LookupTable>().unwrap(), table);
    assert_eq!(trans.get::<KeyEvent>().unwrap(), KeyEvent::from_char('q'));
    assert_eq!(trans.get::<Vec<String>>().unwrap(), vec!["a", "b"]);
    assert_eq!(trans.get::<Vec<u32>>().unwrap(), vec![1, 2, 3]);
    assert_eq!(trans.get::<Property>().unwrap(), Property::new("/mode", "Mode"));
    assert!(!trans.has_remaining());
}

/// **VALUE**: Verifies that a wrong-typed read fails without consuming the field.
///
/// **WHY THIS MATTERS**: The dispatcher tries optional trailing arguments; a failed
/// attempt that advanced the cursor would desynchronise every later read.
///
/// **BUG THIS CATCHES**: Would catch the cursor being moved before the tag check.
#[test]
fn given_uint_field_when_read_as_string_then_mismatch_and_cursor_unchanged() {
    // GIVEN: A transaction holding a single u32
    let mut trans = Transaction::new();
    trans.put(&99u32);
    let before = trans.cursor();

    // WHEN: Reading it as a string
    let result = trans.get::<String>();

    // THEN: Type mismatch, and the u32 is still readable
    match result {
        Err(CodecError::TypeMismatch { expected, found, .. }) => {
            assert_eq!(expected, "string");
            assert_eq!(found, "uint32");
        }
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
    assert_eq!(trans.cursor(), before);
    assert_eq!(trans.get::<u32>().unwrap(), 99);
}

/// **VALUE**: Verifies reading past the last field reports the end rather than panicking.
///
/// **WHY THIS MATTERS**: Requests from buggy clients routinely omit arguments.
///
/// **BUG THIS CATCHES**: Would catch an unchecked index into the buffer.
#[test]
fn given_exhausted_transaction_when_reading_then_mismatch_names_end() {
    // GIVEN: An empty transaction
    let mut trans = Transaction::new();

    // WHEN: Reading a field
    let result = trans.get::<u32>();

    // THEN: A mismatch against the end of the transaction
    match result {
        Err(CodecError::TypeMismatch { found, .. }) => assert_eq!(found, "end of transaction"),
        other => panic!("expected TypeMismatch, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a truncated field body is rejected and leaves the cursor alone.
///
/// **WHY THIS MATTERS**: A length prefix larger than the frame must never be trusted.
///
/// **BUG THIS CATCHES**: Would catch slicing past the buffer on a lying length prefix.
#[test]
fn given_truncated_string_when_read_then_malformed() {
    // GIVEN: A string tag claiming 100 bytes with only 3 behind it
    let mut bytes = vec![FieldTag::String as u8];
    bytes.extend_from_slice(&100u32.to_le_bytes());
    bytes.extend_from_slice(b"abc");
    let mut trans = Transaction::from_bytes(bytes);

    // WHEN: Reading it
    let result = trans.get::<String>();

    // THEN: Malformed, cursor still at the start
    assert!(matches!(result, Err(CodecError::Malformed { .. })));
    assert_eq!(trans.peek_tag(), Some(FieldTag::String));
}

/// **VALUE**: Verifies that an element count larger than the body is rejected up front.
///
/// **WHY THIS MATTERS**: Decoders pre-allocate from the count; a hostile count would
/// otherwise request gigabytes.
///
/// **BUG THIS CATCHES**: Would catch removal of the count sanity check in `FieldReader::count`.
#[test]
fn given_oversized_element_count_when_decoding_list_then_malformed() {
    // GIVEN: A uint32 list claiming a billion elements
    let mut bytes = vec![FieldTag::Uint32List as u8];
    bytes.extend_from_slice(&1_000_000_000u32.to_le_bytes());
    let mut trans = Transaction::from_bytes(bytes);

    // WHEN: Decoding
    let result = trans.get::<Vec<u32>>();

    // THEN: Rejected as malformed
    assert!(matches!(result, Err(CodecError::Malformed { .. })));
}

/// **VALUE**: Verifies that unknown command codes are reported with their value.
///
/// **WHY THIS MATTERS**: Newer clients may send commands this broker does not know;
/// they must fail the request, not the connection.
///
/// **BUG THIS CATCHES**: Would catch unknown codes being mapped to some default opcode.
#[test]
fn given_unknown_command_code_when_read_then_unknown_opcode_error() {
    // GIVEN: A command field with code 12345
    let mut bytes = vec![FieldTag::Command as u8];
    bytes.extend_from_slice(&12345u32.to_le_bytes());
    let mut trans = Transaction::from_bytes(bytes);

    // WHEN: Reading the command
    let result = trans.get_command();

    // THEN: UnknownOpcode carrying the value, not a transport error
    match result {
        Err(error @ CodecError::UnknownOpcode { value: 12345, .. }) => {
            assert!(!error.is_transport());
        }
        other => panic!("expected UnknownOpcode, got {other:?}"),
    }
    assert!(trans.has_remaining());
}

/// **VALUE**: Verifies that a saved cursor rewinds reading to the saved point.
///
/// **WHY THIS MATTERS**: Continuations save the request cursor, run a nested exchange and
/// restore it so the handler picks up exactly where it stopped.
///
/// **BUG THIS CATCHES**: Would catch `restore` being a no-op or resetting to the start.
#[test]
fn given_saved_cursor_when_restored_then_reads_resume_from_it() {
    // GIVEN: Three fields, with a cursor saved after the first
    let mut trans = Transaction::new();
    trans.put(&1u32).put(&2u32).put(&3u32);
    assert_eq!(trans.get::<u32>().unwrap(), 1);
    let saved = trans.cursor();
    assert_eq!(trans.get::<u32>().unwrap(), 2);
    assert_eq!(trans.get::<u32>().unwrap(), 3);

    // WHEN: Restoring the saved cursor
    trans.restore(saved);

    // THEN: The second field is read again
    assert_eq!(trans.get::<u32>().unwrap(), 2);
}

/// **VALUE**: Verifies that a cursor saved on a longer buffer clamps after `clear`.
///
/// **WHY THIS MATTERS**: The reply buffer is recycled between requests; a stale cursor
/// must not point past its end.
///
/// **BUG THIS CATCHES**: Would catch an unclamped restore that later panics on slicing.
#[test]
fn given_cursor_beyond_end_when_restored_then_clamped_to_end() {
    // GIVEN: A cursor taken at the end of a two-field transaction
    let mut trans = Transaction::new();
    trans.put(&1u32).put(&2u32);
    trans.get::<u32>().unwrap();
    trans.get::<u32>().unwrap();
    let far = trans.cursor();

    // WHEN: The buffer is cleared, refilled shorter, and the cursor restored
    trans.clear();
    trans.put(&5u32);
    trans.restore(far);

    // THEN: Nothing remains to read
    assert!(!trans.has_remaining());
    assert_eq!(trans.peek_tag(), None);
}

/// **VALUE**: Verifies that a nested transaction keeps its own contents intact.
///
/// **WHY THIS MATTERS**: Helper events carry a whole transaction as one field.
///
/// **BUG THIS CATCHES**: Would catch the inner read cursor leaking into the encoding.
#[test]
fn given_nested_transaction_when_decoded_then_inner_fields_readable() {
    // GIVEN: An inner transaction embedded in an outer one
    let mut inner = Transaction::new();
    inner.put_command(Opcode::CommitString).put("hi");
    let mut outer = Transaction::new();
    outer.put(&inner);

    // WHEN: Decoding the inner transaction
    let mut decoded: Transaction = outer.get().unwrap();

    // THEN: Its fields read back from the start
    assert_eq!(decoded.get_command().unwrap(), Opcode::CommitString);
    assert_eq!(decoded.get::<String>().unwrap(), "hi");
}

/// **VALUE**: Verifies that unread fields can be forwarded without decoding.
///
/// **WHY THIS MATTERS**: The broker relays helper payloads it does not understand.
///
/// **BUG THIS CATCHES**: Would catch `append_remaining` copying from the buffer start.
#[test]
fn given_partially_read_transaction_when_appended_then_only_rest_is_copied() {
    // GIVEN: A source with one field already consumed
    let mut source = Transaction::new();
    source.put(&1u32).put("rest");
    source.get::<u32>().unwrap();

    // WHEN: Appending the remainder to a reply
    let mut reply = Transaction::reply();
    reply.append_remaining(&source);

    // THEN: Reply is [Reply]["rest"]
    assert_eq!(reply.get_command().unwrap(), Opcode::Reply);
    assert_eq!(reply.get::<String>().unwrap(), "rest");
    assert!(!reply.has_remaining());
}

/// **VALUE**: Verifies that every opcode survives the trip through its wire code.
///
/// **WHY THIS MATTERS**: The opcode table is macro generated; a duplicate code would make
/// two commands indistinguishable.
///
/// **BUG THIS CATCHES**: Would catch two opcodes sharing a wire value.
#[test]
fn given_all_opcodes_when_mapped_through_wire_code_then_identity() {
    for &opcode in Opcode::ALL {
        assert_eq!(Opcode::from_wire(opcode.to_wire()), Some(opcode), "{opcode}");
    }
}

/// **VALUE**: Verifies an invalid code point inside a wide string is rejected.
///
/// **WHY THIS MATTERS**: Wide strings go straight into Rust `String`s.
///
/// **BUG THIS CATCHES**: Would catch an unchecked `char::from_u32` conversion.
#[test]
fn given_surrogate_code_point_when_decoding_wide_string_then_malformed() {
    // GIVEN: A one-character wide string holding a lone surrogate
    let mut bytes = vec![FieldTag::WideString as u8];
    bytes.extend_from_slice(&1u32.to_le_bytes());
    bytes.extend_from_slice(&0xD800u32.to_le_bytes());
    let mut trans = Transaction::from_bytes(bytes);

    // WHEN / THEN: Decoding fails
    assert!(matches!(
        trans.get::<WideString>(),
        Err(CodecError::Malformed { .. })
    ));
}
