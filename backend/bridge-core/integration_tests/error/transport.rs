use bridge_core::SessionId;
use bridge_core::error::transport::TransportError;
use bridge_core::transport::wire;
use bridge_core::transport::{Endpoint, EndpointKind};

/// **VALUE**: Endpoint errors point at the code that asked for the
/// endpoint, not at the URL helper.
///
/// **WHY THIS MATTERS**: A bad relay URL in the config file surfaces as a
/// warning while the pool opens. The location must lead back to the caller.
///
/// **BUG THIS CATCHES**: Would catch `#[track_caller]` being removed from
/// `Endpoint::new`, which would report the transport module for every
/// caller.
#[test]
fn given_unsupported_scheme_when_endpoint_built_then_error_names_caller() {
    // GIVEN: An FTP base URL
    let session_id = SessionId::parse("0123abcd8f").unwrap();

    // WHEN: Building the endpoint
    let err = Endpoint::new(EndpointKind::Relay, "ftp://example.org", &session_id).unwrap_err();

    // THEN: Endpoint error raised at this call site
    let TransportError::Endpoint { message, location } = &err else {
        panic!("Expected endpoint error, got {err:?}");
    };
    assert!(message.contains("ftp"));
    assert!(location.file.contains("integration_tests"), "{location}");
    assert!(err.to_string().starts_with("Endpoint Error:"));
}

#[test]
fn given_empty_frame_when_decoded_then_codec_error() {
    // GIVEN/WHEN
    let err = wire::decode("").unwrap_err();

    // THEN
    assert!(matches!(err, TransportError::Codec { .. }));
    assert!(err.to_string().contains("Empty frame"));
}
