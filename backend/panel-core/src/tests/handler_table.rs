use crate::dispatch::handlers::{required_opcodes, standard_table};
use crate::dispatch::{Dispatcher, HandlerOutcome, HandlerTable, Request};
use crate::session::Role;
use crate::transaction::Opcode;

fn noop(_dispatcher: &mut Dispatcher, _request: &mut Request) -> HandlerOutcome {
    HandlerOutcome::Done
}

/// **VALUE**: Verifies the shipped handler table covers every client opcode exactly once.
///
/// **WHY THIS MATTERS**: The dispatcher refuses to start on an inconsistent table; this
/// test finds the gap before a release does.
///
/// **BUG THIS CATCHES**: Would catch a new opcode added without a handler, or a handler
/// registered twice after a copy-paste.
#[test]
fn given_standard_table_when_validated_then_no_duplicates_or_gaps() {
    // GIVEN: The standard table
    let table = standard_table();

    // WHEN: Validating against the required opcodes
    let report = table.validate(&required_opcodes());

    // THEN: Clean
    assert!(report.is_valid(), "{report}");
    assert_eq!(table.len(), required_opcodes().len());
}

/// **VALUE**: Verifies duplicate registrations are reported and the first one wins.
///
/// **WHY THIS MATTERS**: A silent overwrite would change which role may call an opcode.
///
/// **BUG THIS CATCHES**: Would catch `register` replacing an existing entry.
#[test]
fn given_opcode_registered_twice_when_validated_then_duplicate_reported() {
    // GIVEN: Reset registered for engine clients, then again for config clients
    let mut table = HandlerTable::new();
    table
        .sync(Opcode::Reset, &[Role::EngineClient], noop)
        .sync(Opcode::Reset, &[Role::ConfigClient], noop);

    // WHEN: Validating
    let report = table.validate(&[Opcode::Reset]);

    // THEN: Duplicate reported, first roles kept
    assert_eq!(report.duplicates, vec![Opcode::Reset]);
    assert!(report.missing.is_empty());
    let entry = table.get(Opcode::Reset).unwrap();
    assert!(entry.permits(Role::EngineClient));
    assert!(!entry.permits(Role::ConfigClient));
}

/// **VALUE**: Verifies missing opcodes are listed in the report.
///
/// **WHY THIS MATTERS**: A missing handler turns a valid client request into `Fail`.
///
/// **BUG THIS CATCHES**: Would catch `validate` only checking duplicates.
#[test]
fn given_partial_table_when_validated_then_missing_opcodes_listed() {
    // GIVEN: Only FocusIn registered
    let mut table = HandlerTable::new();
    table.sync(Opcode::FocusIn, &[Role::EngineClient], noop);

    // WHEN: Validating against FocusIn and FocusOut
    let report = table.validate(&[Opcode::FocusIn, Opcode::FocusOut]);

    // THEN: FocusOut is missing
    assert!(!report.is_valid());
    assert_eq!(report.missing, vec![Opcode::FocusOut]);
    assert!(report.to_string().contains("FocusOut"));
}

/// **VALUE**: Verifies role gating in the standard table.
///
/// **WHY THIS MATTERS**: Config clients must not create engines and engine clients must
/// not write config.
///
/// **BUG THIS CATCHES**: Would catch a handler registered with the wrong role list.
#[test]
fn given_standard_table_when_checking_roles_then_each_family_is_gated() {
    let table = standard_table();
    let permits = |opcode: Opcode, role: Role| table.get(opcode).is_some_and(|e| e.permits(role));

    assert!(permits(Opcode::NewInstance, Role::EngineClient));
    assert!(!permits(Opcode::NewInstance, Role::ConfigClient));
    assert!(permits(Opcode::SetConfigString, Role::ConfigClient));
    assert!(!permits(Opcode::SetConfigString, Role::EngineClient));
    assert!(permits(Opcode::RegisterHelper, Role::HelperManagerClient));
    assert!(!permits(Opcode::RegisterHelper, Role::EngineClient));
    assert!(permits(Opcode::GetIseList, Role::EngineClient));
    assert!(permits(Opcode::GetIseList, Role::HelperManagerClient));
    for role in Role::CLASSIFIED {
        assert!(permits(Opcode::CloseConnection, role));
    }
    assert!(!permits(Opcode::CloseConnection, Role::Unclassified));
}

/// **VALUE**: Verifies broker to client opcodes are never dispatchable.
///
/// **WHY THIS MATTERS**: A client sending `CommitString` must get `Fail`, not reach an
/// engine.
///
/// **BUG THIS CATCHES**: Would catch callback opcodes leaking into `required_opcodes`.
#[test]
fn given_required_opcodes_when_inspected_then_markers_and_callbacks_excluded() {
    let required = required_opcodes();
    for opcode in [
        Opcode::Request,
        Opcode::Reply,
        Opcode::Continue,
        Opcode::OpenConnection,
        Opcode::CommitString,
        Opcode::GetSurroundingText,
    ] {
        assert!(!required.contains(&opcode), "{opcode} must not be required");
    }
    assert!(required.contains(&Opcode::ProcessKeyEvent));
    assert!(required.contains(&Opcode::Exit));
}
