use bridge_core::error::CoreError;
use bridge_core::error::launch::LaunchError;

use common::ErrorLocation;

use std::error::Error;
use std::io::{Error as IoError, ErrorKind};

/// **VALUE**: Verifies that `LaunchError::Spawn` keeps its message, its
/// location and the underlying IO error.
///
/// **WHY THIS MATTERS**: Launch failures happen on user machines we cannot
/// inspect. The log line is all there is, so it must say what failed, where,
/// and why the OS refused.
///
/// **BUG THIS CATCHES**: Would catch if someone:
/// - Removes the `location` field or drops it from the Display string
/// - Loses the `#[source]` attribute so the IO error is no longer chained
#[test]
fn given_spawn_error_when_formatted_then_includes_location_and_source() {
    // GIVEN: A spawn error wrapping an IO error
    let err = LaunchError::Spawn {
        message: "Failed to spawn entry-hw".to_string(),
        location: ErrorLocation::here(),
        source: Box::new(IoError::new(ErrorKind::PermissionDenied, "permission denied")),
    };

    // WHEN: Formatting the error as string
    let error_string = format!("{}", err);

    // THEN: Type, message and location are present, the cause is chained
    assert!(error_string.contains("Spawn Error"));
    assert!(error_string.contains("Failed to spawn entry-hw"));
    assert!(error_string.contains("launch.rs"));
    assert!(err.source().is_some(), "IO error should be the source");
}

#[test]
fn given_unsupported_host_error_when_wrapped_in_core_error_then_display_unchanged() {
    // GIVEN: An unsupported host error
    let err = LaunchError::UnsupportedHost {
        message: "No URL opener known for plan9".to_string(),
        location: ErrorLocation::here(),
    };
    let direct = err.to_string();

    // WHEN: Converting into the crate-level error
    let core: CoreError = err.into();

    // THEN: Transparent wrapper
    assert_eq!(core.to_string(), direct);
    assert!(direct.starts_with("Unsupported Host Error: No URL opener known for plan9 ["));
}
