use bridge_core::error::session::SessionError;

use common::ErrorLocation;

/// **VALUE**: Verifies that `SessionError::Closed` names the error type and
/// where it was raised.
///
/// **BUG THIS CATCHES**: Would catch a Display change that drops the
/// location suffix shared by every error in the workspace.
#[test]
fn given_closed_error_when_formatted_then_includes_location() {
    // GIVEN: A closed error
    let location = ErrorLocation::here();
    let err = SessionError::Closed {
        message: "Session actor stopped".to_string(),
        location,
    };

    // WHEN: Formatting
    let error_string = err.to_string();

    // THEN
    assert!(error_string.contains("Session Closed Error"));
    assert!(error_string.contains("Session actor stopped"));
    assert!(error_string.ends_with(&location.to_string()));
}
