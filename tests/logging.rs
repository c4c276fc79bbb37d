//! Decode anomalies are logged as warnings through the `log` facade.

mod common;

use galileo_testing::{BodyBuilder, LoggerHandle, events_of, logger, telemetry_frame};
use rstest::rstest;

#[rstest]
fn unknown_tag_is_logged(mut logger: LoggerHandle) {
    let body = BodyBuilder::new().u8(0x35, 1).raw(&[0x99, 1, 2, 3, 4]).build();
    let _ = events_of(&telemetry_frame(&body));

    let warnings = logger.drain_at(log::Level::Warn);
    assert!(
        warnings
            .iter()
            .any(|m| m.contains("unknown tag 0x99") && m.contains("skipping 4 bytes")),
        "warnings: {warnings:?}"
    );
}

#[rstest]
fn checksum_failure_is_logged(mut logger: LoggerHandle) {
    let mut wire = telemetry_frame(&BodyBuilder::new().u8(0x35, 1).build());
    let last = wire.len() - 1;
    wire[last] ^= 0xFF;
    let _ = events_of(&wire);

    let warnings = logger.drain_at(log::Level::Warn);
    assert!(
        warnings.iter().any(|m| m.contains("checksum mismatch")),
        "warnings: {warnings:?}"
    );
}
