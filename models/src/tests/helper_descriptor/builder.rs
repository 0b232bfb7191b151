use crate::{HelperDescriptorBuilder, ModelError};

/// **VALUE**: Verifies that a fully specified builder produces the descriptor.
///
/// **WHY THIS MATTERS**: The supervisor builds one descriptor per helper entry in the
/// catalogue; `GetHelperList` replies are produced from them.
///
/// **BUG THIS CATCHES**: Would catch fields being swapped or dropped in `build()`.
#[test]
fn given_complete_builder_when_building_then_returns_descriptor() {
    // GIVEN: A builder with every field set
    let builder = HelperDescriptorBuilder::default()
        .with_uuid("c6a0c1f2-0000-4000-8000-000000000001")
        .with_name("Handwriting")
        .with_icon("/usr/share/icons/hw.png")
        .with_description("Draw characters")
        .with_option(3)
        .with_module("hw-helper");

    // WHEN: Building
    let descriptor = builder.build().expect("descriptor should build");

    // THEN: Every field is carried over
    assert_eq!(descriptor.uuid, "c6a0c1f2-0000-4000-8000-000000000001");
    assert_eq!(descriptor.name, "Handwriting");
    assert_eq!(descriptor.icon, "/usr/share/icons/hw.png");
    assert_eq!(descriptor.description, "Draw characters");
    assert_eq!(descriptor.option, 3);
    assert_eq!(descriptor.module, "hw-helper");
}

/// **VALUE**: Verifies that a missing UUID is rejected.
///
/// **WHY THIS MATTERS**: The catalogue is keyed by uuid. A helper without one could never
/// be started or stopped.
///
/// **BUG THIS CATCHES**: Would catch the required-field check being dropped.
#[test]
fn given_missing_uuid_when_building_then_missing_field() {
    // GIVEN: Builder without uuid
    let builder = HelperDescriptorBuilder::default()
        .with_name("Handwriting")
        .with_module("hw-helper");

    // WHEN: Building
    let result = builder.build();

    // THEN: MissingField naming the uuid
    match result {
        Err(ModelError::MissingField { field, .. }) => assert_eq!(field, "uuid"),
        other => panic!("Expected MissingField, got {other:?}"),
    }
}

/// **VALUE**: Verifies that fields containing the cache separator are rejected.
///
/// **WHY THIS MATTERS**: The catalogue cache file is colon separated. A name containing ':'
/// would shift every following column and corrupt the entry on the next startup.
///
/// **BUG THIS CATCHES**: Would catch the reserved-character check being removed.
#[test]
fn given_name_with_colon_when_building_then_reserved_character() {
    // GIVEN: A name with the field separator in it
    let builder = HelperDescriptorBuilder::default()
        .with_uuid("uuid-1")
        .with_name("Bad:Name")
        .with_module("hw-helper");

    // WHEN: Building
    let result = builder.build();

    // THEN: Rejected with the offending value carried along
    match result {
        Err(ModelError::ReservedCharacter { field, value, .. }) => {
            assert_eq!(field, "name");
            assert_eq!(value, "Bad:Name");
        }
        other => panic!("Expected ReservedCharacter, got {other:?}"),
    }
}

/// **VALUE**: Verifies that empty required strings are rejected.
///
/// **WHY THIS MATTERS**: An empty module name would make the launcher exec the module
/// directory itself.
///
/// **BUG THIS CATCHES**: Would catch `Some("")` slipping past the required-field check.
#[test]
fn given_empty_module_when_building_then_empty_field() {
    // GIVEN: Empty module
    let builder = HelperDescriptorBuilder::default()
        .with_uuid("uuid-1")
        .with_name("Handwriting")
        .with_module("");

    // WHEN: Building
    let result = builder.build();

    // THEN: EmptyField, distinct from a missing module
    match result {
        Err(error @ ModelError::EmptyField { .. }) => {
            assert_eq!(error.field(), "module");
            assert!(error.to_string().contains("module cannot be empty"));
        }
        other => panic!("Expected EmptyField, got {other:?}"),
    }
}

/// **VALUE**: Verifies that a builder error points at the `build()` call site.
///
/// **WHY THIS MATTERS**: The catalogue scan logs skipped helpers with the error's location.
/// A location inside builder.rs would be the same for every bad manifest.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being dropped from `build()` or from
/// the private validation helpers.
#[test]
fn given_invalid_icon_when_building_then_location_is_build_call_site() {
    // GIVEN: An icon with a newline in it
    let builder = HelperDescriptorBuilder::default()
        .with_uuid("uuid-1")
        .with_name("Handwriting")
        .with_icon("a\nb")
        .with_module("hw-helper");

    // WHEN: Building
    let error = builder.build().expect_err("icon should be refused");

    // THEN: The location is this test file, not the builder module
    match error {
        ModelError::ReservedCharacter { field, location, .. } => {
            assert_eq!(field, "icon");
            assert!(location.file.ends_with("tests/helper_descriptor/builder.rs"));
        }
        other => panic!("Expected ReservedCharacter, got {other:?}"),
    }
}
