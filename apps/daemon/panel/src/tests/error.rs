// Unit tests for error module
// Tests conversion from core errors and the rendered message

use crate::error::PanelError;

use panel_core::error::config::ConfigError;

use common::ErrorLocation;

use std::panic::Location;

/// **VALUE**: Verifies core errors convert into `PanelError::Core` with their message.
///
/// **WHY THIS MATTERS**: `main` prints only the top-level error; the core message is the
/// only hint of what went wrong.
///
/// **BUG THIS CATCHES**: Would catch the conversion dropping the inner message.
#[test]
fn given_config_error_when_converted_then_core_variant_keeps_message() {
    // GIVEN: A validation failure from panel-core
    let inner = ConfigError::ValidationError {
        location: ErrorLocation::from(Location::caller()),
        reason: String::from("socket.path cannot be empty"),
    };

    // WHEN: Converting
    let err = PanelError::from(inner);

    // THEN: Core variant carrying the reason
    match &err {
        PanelError::Core { message, .. } => {
            assert!(message.contains("socket.path cannot be empty"));
        }
        other => panic!("expected Core, got {other:?}"),
    }
}

/// **VALUE**: Verifies the rendered message names the variant and the location.
///
/// **WHY THIS MATTERS**: Operators read these lines in the journal.
///
/// **BUG THIS CATCHES**: Would catch the location being left out of `Display`.
#[test]
fn given_panel_error_when_displayed_then_prefix_and_location_present() {
    let err = PanelError::Panel {
        message: String::from("Test"),
        location: ErrorLocation::from(Location::caller()),
    };

    let rendered = err.to_string();

    assert!(rendered.starts_with("Panel Error: Test"));
    assert!(rendered.contains("error.rs"));
}
