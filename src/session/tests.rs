//! Unit tests for [`Session`].

use std::sync::Arc;

use rstest::{fixture, rstest};

use super::*;
use crate::{
    checksum::crc16,
    tag::{TagId, TagValue},
};

const IMEI: &str = "868204005647838";

fn wire(header: u8, length_field: u16, body: &[u8]) -> Vec<u8> {
    let mut out = vec![header];
    out.extend_from_slice(&length_field.to_le_bytes());
    out.extend_from_slice(body);
    let crc = crc16(&out);
    out.extend_from_slice(&crc.to_le_bytes());
    out
}

fn telemetry(body: &[u8]) -> Vec<u8> {
    wire(0x01, u16::try_from(body.len()).expect("short body"), body)
}

fn trailer(frame: &[u8]) -> u16 {
    u16::from_le_bytes([frame[frame.len() - 2], frame[frame.len() - 1]])
}

fn imei_body() -> Vec<u8> {
    let mut body = vec![0x03];
    body.extend_from_slice(IMEI.as_bytes());
    body
}

/// Record marker, record number, supply voltage and HDOP.
fn archived(number: u8, hdop: u8) -> [u8; 8] { [0x10, number, 0x00, 0x41, 0xE0, 0x2E, 0x35, hdop] }

fn records(events: &[DecodedEvent]) -> Vec<&DeviceRecord> {
    events
        .iter()
        .filter_map(|e| match e {
            DecodedEvent::Record(r) => Some(r),
            _ => None,
        })
        .collect()
}

fn issues(events: &[DecodedEvent]) -> Vec<&DecodeIssue> {
    events
        .iter()
        .filter_map(|e| match e {
            DecodedEvent::ProtocolError(i) => Some(i),
            _ => None,
        })
        .collect()
}

fn session_with(config: SessionConfig) -> Session {
    Session::new(
        ConnectionId::new(1),
        Arc::new(TagRegistry::galileosky()),
        config,
    )
}

#[fixture]
fn session() -> Session { session_with(SessionConfig::default()) }

#[rstest]
fn minimal_imei_frame_yields_record_then_ack(mut session: Session) {
    let frame = telemetry(&imei_body());
    let events = session.feed(&frame).expect("feed");

    assert_eq!(events.len(), 2);
    let DecodedEvent::Record(record) = &events[0] else {
        panic!("expected a record first, got {:?}", events[0]);
    };
    assert_eq!(record.imei.as_deref(), Some(IMEI));
    assert!(!record.archive_pending);
    assert_eq!(
        events[1],
        DecodedEvent::AckRequired(Ack::for_checksum(trailer(&frame)))
    );
    assert_eq!(session.last_imei(), Some(IMEI));
    assert_eq!(session.state(), SessionState::AwaitingData);
}

#[rstest]
fn corrupt_checksum_is_rejected_and_stream_continues(mut session: Session) {
    let mut bad = telemetry(&[0x35, 0x07]);
    let last = bad.len() - 1;
    bad[last] ^= 0xFF;
    let good = telemetry(&[0x35, 0x08]);
    let mut input = bad.clone();
    input.extend_from_slice(&good);

    let events = session.feed(&input).expect("feed");

    assert_eq!(events.len(), 4);
    assert!(matches!(
        events[0],
        DecodedEvent::ProtocolError(DecodeIssue::Framing(
            FramingError::ChecksumMismatch { .. }
        ))
    ));
    assert_eq!(events[1], DecodedEvent::AckRequired(Ack::REJECTED));
    let DecodedEvent::Record(record) = &events[2] else {
        panic!("expected the following frame to decode");
    };
    assert_eq!(
        record.record.value(TagId::Main(0x35)),
        Some(&TagValue::Unsigned(8))
    );
    assert_eq!(
        events[3],
        DecodedEvent::AckRequired(Ack::for_checksum(trailer(&good)))
    );
}

#[rstest]
fn single_byte_reads_match_whole_read(mut session: Session) {
    let mut input = telemetry(&imei_body());
    input.extend_from_slice(&telemetry(&[0x35, 0x07, 0x41, 0xE0, 0x2E]));

    let whole = session_with(SessionConfig::default())
        .feed(&input)
        .expect("whole feed");
    let mut trickled = Vec::new();
    for byte in &input {
        trickled.extend(session.feed(std::slice::from_ref(byte)).expect("byte feed"));
    }

    assert_eq!(trickled, whole);
    assert_eq!(records(&trickled).len(), 2);
}

#[rstest]
fn imei_carries_over_to_later_frames(mut session: Session) {
    session.feed(&telemetry(&imei_body())).expect("first frame");
    let events = session
        .feed(&wire(0x01, 0x8002, &[0x35, 0x09]))
        .expect("second frame");

    let records = records(&events);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].imei.as_deref(), Some(IMEI));
    assert!(records[0].archive_pending);
    assert!(records[0].record.imei().is_none());
}

#[rstest]
fn record_without_any_imei_is_unattributed(mut session: Session) {
    let events = session.feed(&telemetry(&[0x35, 0x09])).expect("feed");
    assert_eq!(records(&events)[0].imei, None);
}

#[rstest]
#[case::keepalive(0x15)]
#[case::extension(0x05)]
fn non_telemetry_frames_are_only_acknowledged(mut session: Session, #[case] header: u8) {
    let frame = wire(header, 3, &[0x35, 0x07, 0x00]);
    let events = session.feed(&frame).expect("feed");
    assert_eq!(
        events,
        vec![DecodedEvent::AckRequired(Ack::for_checksum(trailer(&frame)))]
    );
}

#[rstest]
fn archive_batch_splits_into_records(mut session: Session) {
    let mut body = imei_body();
    for (n, hdop) in [(1, 5), (2, 6), (3, 7)] {
        body.extend_from_slice(&archived(n, hdop));
    }
    assert!(body.len() >= crate::record::MULTI_RECORD_THRESHOLD);
    let frame = telemetry(&body);

    let events = session.feed(&frame).expect("feed");

    let decoded = records(&events);
    let hdops: Vec<_> = decoded
        .iter()
        .map(|r| r.record.value(TagId::Main(0x35)).cloned())
        .collect();
    assert_eq!(
        hdops,
        vec![
            Some(TagValue::Unsigned(5)),
            Some(TagValue::Unsigned(6)),
            Some(TagValue::Unsigned(7)),
        ]
    );
    assert!(decoded.iter().all(|r| r.imei.as_deref() == Some(IMEI)));
    assert_eq!(events.len(), 4);
    assert_eq!(
        events.last(),
        Some(&DecodedEvent::AckRequired(Ack::for_checksum(trailer(&frame))))
    );
}

#[rstest]
fn unknown_tag_is_reported_before_the_record(mut session: Session) {
    let body = [0x35, 0x07, 0x99, 1, 2, 3, 4, 0x41, 0xE0, 0x2E];
    let events = session.feed(&telemetry(&body)).expect("feed");

    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        DecodedEvent::ProtocolError(DecodeIssue::Protocol(ProtocolError::UnknownTag {
            tag: TagId::Main(0x99),
            offset: 2,
            skipped: 4,
        }))
    );
    let DecodedEvent::Record(record) = &events[1] else {
        panic!("expected a record");
    };
    assert_eq!(record.record.len(), 2);
    assert!(matches!(events[2], DecodedEvent::AckRequired(_)));
}

#[rstest]
fn truncated_value_keeps_earlier_fields(mut session: Session) {
    let events = session
        .feed(&telemetry(&[0x35, 0x07, 0x44, 0x01, 0x02]))
        .expect("feed");

    assert_eq!(
        issues(&events),
        vec![&DecodeIssue::Protocol(ProtocolError::TruncatedValue {
            tag: TagId::Main(0x44),
            offset: 2,
            needed: 4,
            remaining: 2,
        })]
    );
    let decoded = records(&events);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].record.tags().collect::<Vec<_>>(), vec![TagId::Main(0x35)]);
}

#[test]
fn malformed_length_resyncs_with_one_report() {
    let config = SessionConfig::default().framer(FramerConfig::default().max_body_length(64));
    let mut session = session_with(config);
    let mut input = vec![0x01, 0xFF, 0x7F];
    input.extend_from_slice(&telemetry(&imei_body()));

    let events = session.feed(&input).expect("resync is not fatal");

    assert_eq!(
        issues(&events),
        vec![&DecodeIssue::Framing(FramingError::MalformedLength {
            declared: 0x7FFF,
            max: 64,
        })]
    );
    assert_eq!(records(&events).len(), 1);
    assert!(matches!(events.last(), Some(DecodedEvent::AckRequired(_))));
}

#[test]
fn malformed_length_disconnects_when_strict() {
    let config = SessionConfig::default()
        .framer(FramerConfig::default().max_body_length(64))
        .malformed_length_policy(RecoveryPolicy::Disconnect);
    let mut session = session_with(config);

    assert_eq!(
        session.feed(&[0x01, 0xFF, 0x7F]),
        Err(FeedError {
            events: Vec::new(),
            error: FramingError::MalformedLength {
                declared: 0x7FFF,
                max: 64,
            },
        })
    );
}

#[test]
fn fatal_error_hands_back_frames_completed_before_it() {
    let config = SessionConfig::default()
        .framer(FramerConfig::default().max_body_length(64))
        .malformed_length_policy(RecoveryPolicy::Disconnect);
    let mut session = session_with(config);
    let frame = telemetry(&imei_body());
    let mut input = frame.clone();
    input.extend_from_slice(&[0x01, 0xFF, 0x7F]);

    let failure = session.feed(&input).expect_err("strict session must fail");

    assert_eq!(
        failure.error,
        FramingError::MalformedLength {
            declared: 0x7FFF,
            max: 64,
        }
    );
    let decoded = records(&failure.events);
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].imei.as_deref(), Some(IMEI));
    assert_eq!(
        failure.events.last(),
        Some(&DecodedEvent::AckRequired(Ack::for_checksum(trailer(&frame))))
    );
}

#[test]
fn oversized_partial_frame_exceeds_buffer_limit() {
    let mut session = session_with(SessionConfig::default().max_buffered_bytes(16));
    let mut partial = vec![0x01, 0x40, 0x00];
    partial.extend_from_slice(&[0x35; 13]);
    assert!(session.feed(&partial).expect("at the limit").is_empty());

    assert_eq!(
        session.feed(&[0x35]).map_err(|failure| failure.error),
        Err(FramingError::BufferLimitExceeded {
            buffered: 17,
            limit: 16,
        })
    );
}

#[rstest]
fn state_follows_buffer(mut session: Session) {
    let frame = telemetry(&[0x35, 0x07]);
    assert_eq!(session.state(), SessionState::AwaitingData);

    session.feed(&frame[..4]).expect("partial");
    assert_eq!(session.state(), SessionState::Idle);
    assert_eq!(session.buffered(), 4);

    session.feed(&frame[4..]).expect("rest");
    assert_eq!(session.state(), SessionState::AwaitingData);
}

#[rstest]
fn close_reports_discarded_bytes(mut session: Session) {
    session.feed(&[0x01, 0x02]).expect("partial");
    assert_eq!(session.close(), EofError::MidFrame { bytes_discarded: 2 });
    assert_eq!(
        session_with(SessionConfig::default()).close(),
        EofError::CleanClose
    );
}

#[test]
fn tag_walk_strategy_ignores_markers_inside_values() {
    let config = SessionConfig::default().boundary(Arc::new(crate::record::TagWalk));
    let mut session = session_with(config);
    let mut body = imei_body();
    // Supply voltage 0x0010 hides a marker byte inside its value.
    body.extend_from_slice(&[0x10, 0x01, 0x00, 0x41, 0x10, 0x00, 0x35, 0x05]);
    body.extend_from_slice(&archived(2, 6));

    let events = session.feed(&telemetry(&body)).expect("feed");

    let decoded = records(&events);
    assert_eq!(decoded.len(), 2);
    assert_eq!(
        decoded[0].record.value(TagId::Main(0x41)),
        Some(&TagValue::Unsigned(0x10))
    );
}
