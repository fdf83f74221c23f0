use crate::config::BridgeConfig;
use crate::identity::SessionId;
use crate::ports::PortData;
use crate::transport::wire::{
    ControlDirective, InboundPayload, Packet, decode, encode_event,
};
use crate::transport::{
    CandidateId, Endpoint, EndpointKind, FrameSink, InboundMessage, OutboundMessage,
    TransportPool,
};

use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

fn room() -> SessionId {
    SessionId::parse("0123abcd8f").unwrap()
}

// ============================================
// WIRE CODEC
// ============================================

#[test]
fn given_engine_frames_when_decoded_then_packets_recognized() {
    // GIVEN/WHEN/THEN: Each control frame maps to its packet
    assert_eq!(decode("1").unwrap(), Packet::Close);
    assert_eq!(decode("2").unwrap(), Packet::Ping);
    assert_eq!(decode("3").unwrap(), Packet::Pong);
    assert_eq!(decode("40").unwrap(), Packet::Connect);
    assert_eq!(decode("41").unwrap(), Packet::Disconnect);
    assert_eq!(decode("6").unwrap(), Packet::Other("6".to_string()));
    assert!(decode("").is_err());
}

#[test]
fn given_open_frame_when_decoded_then_heartbeat_settings_read() {
    // GIVEN: A handshake frame
    let frame = r#"0{"sid":"abc","upgrades":[],"pingInterval":5000,"pingTimeout":2000}"#;

    // WHEN: Decoding
    let packet = decode(frame).unwrap();

    // THEN: Ping interval is available
    let Packet::Open(info) = packet else {
        panic!("Expected open packet, got {packet:?}");
    };
    assert_eq!(info.sid, "abc");
    assert_eq!(info.ping_interval(), Duration::from_secs(5));
    assert_eq!(info.ping_timeout_ms, 2000);
}

/// **VALUE**: Event frames decode with or without namespace and ack id.
///
/// **BUG THIS CATCHES**: Would catch a decoder that assumes the argument
/// array starts right after `42`, which breaks on `42/hw,7[...]`.
#[test]
fn given_event_frames_when_decoded_then_name_and_argument_extracted() {
    // GIVEN: A plain event and one with namespace plus ack id
    let plain = r#"42["mode",1]"#;
    let namespaced = r#"42/hw,7["message",{"data":"x"}]"#;

    // WHEN/THEN
    assert_eq!(
        decode(plain).unwrap(),
        Packet::Event {
            name: "mode".to_string(),
            data: json!(1)
        }
    );
    assert_eq!(
        decode(namespaced).unwrap(),
        Packet::Event {
            name: "message".to_string(),
            data: json!({"data": "x"})
        }
    );
    assert!(decode("42").is_err());
    assert!(decode("42[]").is_err());
    assert!(decode("42[1,2]").is_err());
}

#[test]
fn given_outbound_message_when_framed_then_matches_bridge_shape() {
    // GIVEN: A message for mode 0
    let message = OutboundMessage::new(r#"{"3":1}"#.to_string(), Some(0));

    // WHEN: Framing
    let frame = message.to_frame().unwrap();

    // THEN: `42["message",{data,mode,type}]`
    assert_eq!(
        frame,
        r#"42["message",{"data":"{\"3\":1}","mode":0,"type":"utf8"}]"#
    );
    assert_eq!(encode_event("mode", &1).unwrap(), r#"42["mode",1]"#);
}

/// **VALUE**: Every inbound `data` shape is classified without panicking.
///
/// **WHY THIS MATTERS**: Malformed inbound payloads must never crash message
/// handling; they are skipped and the session continues.
#[test]
fn given_inbound_data_shapes_when_classified_then_each_payload_kind_returned() {
    // GIVEN/WHEN/THEN
    assert_eq!(InboundMessage::new(json!(null)).payload(), InboundPayload::Empty);
    assert_eq!(InboundMessage::new("").payload(), InboundPayload::Empty);
    assert_eq!(
        InboundMessage::new("disconnectHardware").payload(),
        InboundPayload::Control(ControlDirective::Disconnect)
    );

    let expected = PortData::from_value(json!({"a0": 512})).unwrap();
    assert_eq!(
        InboundMessage::new(r#"{"a0":512}"#).payload(),
        InboundPayload::Record(expected.clone())
    );
    assert_eq!(
        InboundMessage::new(json!({"a0": 512})).payload(),
        InboundPayload::Record(expected)
    );

    assert!(matches!(
        InboundMessage::new("{not json").payload(),
        InboundPayload::Malformed(_)
    ));
    assert!(matches!(
        InboundMessage::new("[1,2]").payload(),
        InboundPayload::Malformed(_)
    ));
    assert!(matches!(
        InboundMessage::new(json!(42)).payload(),
        InboundPayload::Malformed(_)
    ));
}

#[test]
fn given_message_event_json_when_deserialized_then_version_optional() {
    // GIVEN: Event arguments with and without version
    let with_version: InboundMessage =
        serde_json::from_value(json!({"data": "x", "version": "1.9.0"})).unwrap();
    let bare: InboundMessage = serde_json::from_value(json!({})).unwrap();

    // THEN
    assert_eq!(with_version.version.as_deref(), Some("1.9.0"));
    assert_eq!(bare.payload(), InboundPayload::Empty);
}

// ============================================
// ENDPOINTS & POLICY
// ============================================

#[test]
fn given_http_and_https_bases_when_endpoint_built_then_socket_urls_carry_room() {
    // GIVEN: A loopback and a relay base
    let loopback = Endpoint::new(EndpointKind::Loopback, "http://127.0.0.1:23518", &room()).unwrap();
    let relay =
        Endpoint::new(EndpointKind::Relay, "https://hardware.playentry.org:23518", &room()).unwrap();

    // THEN: ws/wss with the socket path and query
    assert_eq!(
        loopback.url.as_str(),
        "ws://127.0.0.1:23518/socket.io/?EIO=3&transport=websocket&client=true&roomId=0123abcd8f"
    );
    assert!(relay.url.as_str().starts_with("wss://hardware.playentry.org:23518/socket.io/?"));
    assert_eq!(loopback.to_string(), "127.0.0.1:23518");
}

#[test]
fn given_unsupported_base_when_endpoint_built_then_error() {
    // GIVEN/WHEN/THEN: Neither a bad scheme nor garbage builds
    assert!(Endpoint::new(EndpointKind::Relay, "ftp://example.org", &room()).is_err());
    assert!(Endpoint::new(EndpointKind::Relay, "not a url", &room()).is_err());
}

/// **VALUE**: No wait between attempts ever exceeds the configured maximum.
///
/// **BUG THIS CATCHES**: Would catch jitter pushing the delay above
/// `delay_max`, or the backoff giving up (`None`) and stalling the loop.
#[test]
fn given_default_policy_when_many_delays_drawn_then_all_bounded_by_max() {
    // GIVEN: The default policy
    let policy = BridgeConfig::default().reconnect_policy();
    let mut backoff = policy.backoff();

    // WHEN/THEN: Every delay stays within the cap
    for _ in 0..50 {
        let delay = policy.next_delay(&mut backoff);
        assert!(delay <= policy.delay_max, "{delay:?} exceeds the cap");
        assert!(delay > Duration::ZERO);
    }
}

// ============================================
// POOL
// ============================================

fn closed_port_config() -> BridgeConfig {
    let mut config = BridgeConfig::default();
    config.transport.loopback_url = "http://127.0.0.1:9".to_string();
    config.transport.relay_urls = vec![
        "http://127.0.0.1:9".to_string(),
        "http://127.0.0.1:9".to_string(),
    ];
    config
}

/// **VALUE**: Reopening the pool never accumulates candidates.
///
/// **WHY THIS MATTERS**: Every reopen must detach the previous generation
/// before dialling again, or repeated drops leave zombie sockets feeding
/// events into the session.
///
/// **BUG THIS CATCHES**: Would catch `open_all` appending instead of
/// replacing, or stale candidates still counting as current.
#[tokio::test]
async fn given_repeated_reopens_when_counting_listeners_then_count_stays_constant() {
    // GIVEN: A pool with three candidates
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let mut pool = TransportPool::new(&closed_port_config(), events_tx);

    // WHEN: Reopening many times
    let first = pool.open_all(&room());
    let first_generation = pool.generation();
    for _ in 0..10 {
        pool.open_all(&room());
    }

    // THEN: Same listener count, old generation no longer current
    assert_eq!(first, 3);
    assert_eq!(pool.listener_count(), 3);
    assert_eq!(pool.generation(), first_generation + 10);
    let stale = CandidateId {
        generation: first_generation,
        slot: 0,
    };
    assert!(!pool.is_current(stale));

    pool.close_all();
    assert_eq!(pool.listener_count(), 0);
}

#[tokio::test]
async fn given_secure_host_when_pool_opened_then_loopback_skipped() {
    // GIVEN: A secure host
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let mut config = closed_port_config();
    config.secure_host = true;
    let mut pool = TransportPool::new(&config, events_tx);

    // WHEN: Opening
    let started = pool.open_all(&room());

    // THEN: Only the two relays
    assert_eq!(started, 2);
}

#[tokio::test]
async fn given_bad_candidate_url_when_pool_opened_then_others_still_started() {
    // GIVEN: One relay that cannot become an endpoint
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let mut config = closed_port_config();
    config.transport.relay_urls[0] = "https://".to_string();
    let mut pool = TransportPool::new(&config, events_tx);

    // WHEN: Opening
    let started = pool.open_all(&room());

    // THEN: The other two candidates are dialled
    assert_eq!(started, 2);
}

/// **VALUE**: The active transport is chosen once per generation.
///
/// **BUG THIS CATCHES**: Would catch a later connect from a second
/// candidate stealing the active slot, which lets a straggler's stale data
/// through.
#[tokio::test]
async fn given_two_connects_when_promoting_then_first_stays_active() {
    // GIVEN: An open pool
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let mut pool = TransportPool::new(&closed_port_config(), events_tx);
    pool.open_all(&room());
    let generation = pool.generation();
    let first = CandidateId { generation, slot: 1 };
    let second = CandidateId { generation, slot: 2 };

    // WHEN: Both connect
    let first_promoted = pool.promote(first);
    let second_promoted = pool.promote(second);

    // THEN: Only the first is active; reopening clears it
    assert!(first_promoted);
    assert!(!second_promoted);
    assert!(pool.is_active(first));
    assert!(pool.promote(first));
    assert!(pool.active_endpoint().is_some());

    pool.open_all(&room());
    assert_eq!(pool.active(), None);
    assert!(!pool.promote(first));
}

#[tokio::test]
async fn given_no_active_transport_when_sink_used_then_not_live_and_send_fails() {
    // GIVEN: A pool with nothing promoted
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let pool = TransportPool::new(&closed_port_config(), events_tx);

    // WHEN: Taking its sink
    let mut sink = pool.sink();

    // THEN
    assert!(!sink.is_live());
    assert!(sink.send(&OutboundMessage::new("{}".to_string(), None)).is_err());
    assert!(!pool.has_live_transport());
}

#[tokio::test]
async fn given_last_candidate_gave_up_when_retired_then_pool_reports_exhausted() {
    // GIVEN: A secure-host pool with two relays
    let (events_tx, _events_rx) = mpsc::unbounded_channel();
    let mut config = closed_port_config();
    config.secure_host = true;
    let mut pool = TransportPool::new(&config, events_tx);
    pool.open_all(&room());
    let generation = pool.generation();

    // WHEN/THEN: Retiring one leaves one, retiring both exhausts the pool
    assert!(!pool.retire(CandidateId { generation, slot: 0 }));
    assert!(pool.attempts(CandidateId { generation, slot: 1 }).is_some());
    assert!(pool.retire(CandidateId { generation, slot: 1 }));
}
