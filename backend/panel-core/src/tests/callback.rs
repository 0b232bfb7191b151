use crate::engine::Callback;
use crate::session::InstanceId;
use crate::transaction::{Opcode, Transaction};

use models::{Attribute, KeyEvent};

fn decode_one(trans: &mut Transaction) -> (InstanceId, Callback) {
    let opcode = trans.get_command().unwrap();
    assert!(Callback::is_callback_opcode(opcode), "{opcode}");
    Callback::decode(opcode, trans).unwrap()
}

/// **VALUE**: Verifies a sequence of callbacks decodes in emission order with their ids.
///
/// **WHY THIS MATTERS**: Clients apply preedit, commit and lookup table updates in order;
/// a reordered commit shows up as text typed in the wrong place.
///
/// **BUG THIS CATCHES**: Would catch a callback encoding that forgets an argument and
/// shifts every later field.
#[test]
fn given_several_callbacks_when_encoded_then_decoded_in_order() {
    // GIVEN: Preedit update, commit and key forward for two instances
    let callbacks = vec![
        (
            InstanceId::new(1),
            Callback::UpdatePreeditString {
                text: "nǐ".to_string(),
                attributes: vec![Attribute::underline(0, 2)],
                caret: 2,
            },
        ),
        (InstanceId::new(1), Callback::CommitString("你".to_string())),
        (InstanceId::new(2), Callback::ForwardKeyEvent(KeyEvent::from_char('x'))),
        (InstanceId::new(2), Callback::Beep),
    ];
    let mut trans = Transaction::new();
    for (instance, callback) in &callbacks {
        callback.encode(*instance, &mut trans);
    }

    // WHEN: Decoding them back
    let decoded: Vec<_> = (0..callbacks.len()).map(|_| decode_one(&mut trans)).collect();

    // THEN: Same callbacks, same order
    assert_eq!(decoded, callbacks);
    assert!(!trans.has_remaining());
}

/// **VALUE**: Verifies negative surrounding-text offsets survive the unsigned wire field.
///
/// **WHY THIS MATTERS**: Deleting text before the caret is the common case and uses a
/// negative offset.
///
/// **BUG THIS CATCHES**: Would catch a saturating cast that turns -3 into 0.
#[test]
fn given_negative_delete_offset_when_round_tripped_then_sign_kept() {
    let mut trans = Transaction::new();
    Callback::DeleteSurroundingText {
        offset: -3,
        length: 3,
    }
    .encode(InstanceId::new(9), &mut trans);

    let (instance, callback) = decode_one(&mut trans);

    assert_eq!(instance, InstanceId::new(9));
    assert_eq!(
        callback,
        Callback::DeleteSurroundingText {
            offset: -3,
            length: 3
        }
    );
}

/// **VALUE**: Verifies continuation queries are not mistaken for callbacks.
///
/// **WHY THIS MATTERS**: The client side treats callbacks as fire-and-forget; a query
/// routed there would never be answered and the broker would time out.
///
/// **BUG THIS CATCHES**: Would catch the query opcodes being added to the callback set.
#[test]
fn given_query_opcode_when_decoded_as_callback_then_rejected() {
    assert!(!Callback::is_callback_opcode(Opcode::GetSurroundingText));
    assert!(!Callback::is_callback_opcode(Opcode::GetSelection));

    let mut trans = Transaction::new();
    trans.put(&1u32);
    assert!(Callback::decode(Opcode::GetSelection, &mut trans).is_err());
}

/// **VALUE**: Verifies each callback reports the opcode it is encoded under.
///
/// **WHY THIS MATTERS**: `opcode()` and `encode()` are separate matches that must agree.
///
/// **BUG THIS CATCHES**: Would catch a new variant mapped to a neighbouring opcode.
#[test]
fn given_callback_when_encoded_then_leading_opcode_matches() {
    for callback in [
        Callback::HideLookupTable,
        Callback::StartHelper("helper-uuid".to_string()),
        Callback::SetSelection { start: 1, end: 4 },
    ] {
        let mut trans = Transaction::new();
        callback.encode(InstanceId::new(0), &mut trans);
        assert_eq!(trans.get_command().unwrap(), callback.opcode());
    }
}
