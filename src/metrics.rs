//! Metric helpers for `galileo`.
//!
//! This module defines metric names and thin wrappers around the
//! [`metrics`](https://docs.rs/metrics) macros. Without the `metrics` feature
//! the helpers compile to nothing.

#[cfg(feature = "metrics")]
use metrics::{counter, gauge};

use crate::frame::FrameKind;

/// Name of the gauge tracking active tracker connections.
pub const CONNECTIONS_ACTIVE: &str = "galileo_connections_active";
/// Name of the counter tracking delimited frames, labelled by `kind`.
pub const FRAMES_TOTAL: &str = "galileo_frames_total";
/// Name of the counter tracking records handed to the sink.
pub const RECORDS_TOTAL: &str = "galileo_records_total";
/// Name of the counter tracking codec anomalies, labelled by `type`.
pub const ERRORS_TOTAL: &str = "galileo_errors_total";

/// Increment the active connections gauge.
pub fn inc_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).increment(1.0);
}

/// Decrement the active connections gauge.
pub fn dec_connections() {
    #[cfg(feature = "metrics")]
    gauge!(CONNECTIONS_ACTIVE).decrement(1.0);
}

/// Record a delimited frame.
pub fn inc_frames(kind: FrameKind) {
    #[cfg(feature = "metrics")]
    counter!(FRAMES_TOTAL, "kind" => kind.as_str()).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = kind;
}

/// Record a decoded record.
pub fn inc_records() {
    #[cfg(feature = "metrics")]
    counter!(RECORDS_TOTAL).increment(1);
}

/// Record a codec anomaly of the given type.
pub fn inc_errors(error_type: &'static str) {
    #[cfg(feature = "metrics")]
    counter!(ERRORS_TOTAL, "type" => error_type).increment(1);
    #[cfg(not(feature = "metrics"))]
    let _ = error_type;
}
