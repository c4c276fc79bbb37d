//! Utilities for exercising `galileo` sessions and servers in tests.
//!
//! [`BodyBuilder`] assembles record bodies tag by tag and [`frame`] wraps them
//! with a correct header and checksum, so tests describe device traffic at
//! the protocol level instead of as hex dumps.
//!
//! ```rust
//! use galileo_testing::{BodyBuilder, telemetry_frame};
//!
//! let body = BodyBuilder::new().imei("868204005647838").u8(0x35, 7).build();
//! let wire = telemetry_frame(&body);
//! assert_eq!(wire[0], 0x01);
//! ```

pub mod drive;
pub mod frames;
pub mod logging;

pub use drive::{events_of, feed_chunked, session};
pub use frames::{BodyBuilder, ExtendedBuilder, checksum_of, frame, keepalive_frame, telemetry_frame};
pub use logging::{LoggerHandle, logger};
