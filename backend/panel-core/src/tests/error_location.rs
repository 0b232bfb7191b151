use crate::error::codec::CodecError;
use crate::error::ipc::IpcError;
use crate::session::{HandshakeRequest, Role};
use crate::transaction::{FieldTag, Opcode, Transaction};

use std::io::{Error as IoError, ErrorKind};

/// **VALUE**: Verifies that a type mismatch from `Transaction::get` points at the handler's
/// call, not at the codec.
///
/// **WHY THIS MATTERS**: Handlers log decode failures with the error's location. If every
/// mismatch reported `transaction/mod.rs`, a bad argument in one of forty handlers could
/// not be told apart from another.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being dropped from `get` or from the
/// private tag check it delegates to.
#[test]
fn given_wrong_field_type_when_getting_then_location_is_call_site() {
    // GIVEN: A transaction holding a string
    let mut trans = Transaction::new();
    trans.put("not a number");

    // WHEN: Reading it as a u32
    let line = line!() + 1;
    let error = trans.get::<u32>().expect_err("string is not a u32");

    // THEN: The location is this line of this file
    match error {
        CodecError::TypeMismatch { location, .. } => {
            assert!(location.file.ends_with("tests/error_location.rs"));
            assert_eq!(location.line, line);
        }
        other => panic!("Expected TypeMismatch, got {other:?}"),
    }
}

/// **VALUE**: Verifies that an unknown opcode reports where the command was read.
///
/// **WHY THIS MATTERS**: Unknown opcodes come from newer or broken clients; the log line
/// should name the dispatcher's read, which is the only place that calls `get_command`.
///
/// **BUG THIS CATCHES**: Would catch the location being taken inside `get_command`.
#[test]
fn given_unknown_command_when_reading_then_location_is_call_site() {
    // GIVEN: A command field with an unassigned code
    let raw = vec![FieldTag::Command as u8, 0xEE, 0xEE, 0xEE, 0xEE];
    let mut trans = Transaction::from_bytes(raw);

    // WHEN: Reading the command
    let line = line!() + 1;
    let error = trans.get_command().expect_err("code is not assigned");

    // THEN: UnknownOpcode located here
    match error {
        CodecError::UnknownOpcode { location, .. } => assert_eq!(location.line, line),
        other => panic!("Expected UnknownOpcode, got {other:?}"),
    }
}

/// **VALUE**: Verifies that every handshake rejection points at the `parse` call.
///
/// **WHY THIS MATTERS**: Handshake failures are logged by the dispatcher's accept path;
/// codec failures and rejections from inside `parse` should land on the same line.
///
/// **BUG THIS CATCHES**: Would catch the rejection closure taking its own location, which
/// points into `handshake.rs` for every refused peer.
#[test]
fn given_wrong_server_and_truncated_frame_when_parsed_then_both_locate_the_caller() {
    // GIVEN: A handshake for another broker and one missing its fields
    let mut request = HandshakeRequest::new(Role::EngineClient);
    request.expected_server = "some-other-broker".to_string();
    let mut wrong_server = request.to_transaction();
    let mut truncated = Transaction::new();
    truncated
        .put_command(Opcode::Request)
        .put_command(Opcode::OpenConnection);

    // WHEN: Parsing both
    let rejected = HandshakeRequest::parse(&mut wrong_server).expect_err("wrong server");
    let rejected_line = line!() - 1;
    let short = HandshakeRequest::parse(&mut truncated).expect_err("missing role");
    let short_line = line!() - 1;

    // THEN: Handshake and codec errors both carry the parse call site
    match rejected {
        IpcError::Handshake { location, .. } => {
            assert!(location.file.ends_with("tests/error_location.rs"));
            assert_eq!(location.line, rejected_line);
        }
        other => panic!("Expected Handshake, got {other:?}"),
    }
    match short {
        IpcError::Codec(CodecError::TypeMismatch { location, .. }) => {
            assert_eq!(location.line, short_line);
        }
        other => panic!("Expected Codec(TypeMismatch), got {other:?}"),
    }
}

/// **VALUE**: Verifies that converting an I/O error classifies EOF as `Closed` and records
/// the conversion site.
///
/// **WHY THIS MATTERS**: `read_loop` treats `Closed` as a normal disconnect and `Io` as a
/// failure worth a warning. Misclassifying EOF floods the log on every client exit.
///
/// **BUG THIS CATCHES**: Would catch EOF mapping to `Io`, or `From` losing
/// `#[track_caller]`.
#[test]
fn given_io_errors_when_converted_then_eof_is_closed_and_located() {
    // GIVEN: An EOF and a permission error
    let eof = IoError::from(ErrorKind::UnexpectedEof);
    let denied = IoError::from(ErrorKind::PermissionDenied);

    // WHEN: Converting both
    let line = line!() + 1;
    let closed = CodecError::from(eof);
    let io = CodecError::from(denied);

    // THEN: Closed at the conversion line, Io for the rest
    match closed {
        CodecError::Closed { location, .. } => assert_eq!(location.line, line),
        other => panic!("Expected Closed, got {other:?}"),
    }
    assert!(matches!(io, CodecError::Io { .. }));
    assert!(io.is_transport());
}
