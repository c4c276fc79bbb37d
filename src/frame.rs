//! Frame layout, delimiting, classification and acknowledgement.
//!
//! ```text
//! Byte 0:       header        (0x01 telemetry, 0x15 keepalive, other = extension)
//! Bytes 1-2:    length field   bit 15 = archive pending, bits 0-14 = body length
//! Bytes 3..N:   body           tag/value records
//! Bytes N..N+1: checksum       CRC-16 over bytes 0..N
//! ```

use bytes::Bytes;

pub mod ack;
pub mod framer;
pub mod kind;

pub use ack::Ack;
pub use framer::{FrameOutcome, FramerConfig, try_extract_frame};
pub use kind::FrameKind;

/// Header byte plus the two-byte length field.
pub const HEADER_LEN: usize = 3;

/// Trailing checksum width.
pub const CHECKSUM_LEN: usize = 2;

/// Length field bit signalling that the device still holds archived data.
pub const ARCHIVE_PENDING_BIT: u16 = 0x8000;

/// Length field bits carrying the body length.
pub const LENGTH_MASK: u16 = 0x7FFF;

/// One checksum-verified frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Frame type byte.
    pub header: u8,
    /// Body length from the length field, without the archive bit.
    pub declared_length: u16,
    /// High bit of the length field.
    pub archive_pending: bool,
    /// Tag/value payload; `body.len() == declared_length`.
    pub body: Bytes,
    /// Trailing CRC-16, already verified.
    pub checksum: u16,
}

impl Frame {
    /// Classify this frame by its header byte.
    #[must_use]
    pub const fn kind(&self) -> FrameKind { FrameKind::classify(self.header) }

    /// Acknowledgement echoing this frame's checksum.
    #[must_use]
    pub fn ack(&self) -> Ack { Ack::for_checksum(self.checksum) }
}
