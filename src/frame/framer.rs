//! Frame delimiting over an accumulating TCP buffer.
//!
//! A single read may hold a partial frame, one frame, or several. The framer
//! looks at the front of the buffer only and either slices exactly one frame
//! off it or leaves it untouched for the next read.

use bytes::{Buf, BytesMut};

use super::{ARCHIVE_PENDING_BIT, CHECKSUM_LEN, Frame, HEADER_LEN, LENGTH_MASK};
use crate::{
    byte_order::{array_at, read_le_u16},
    checksum::crc16,
    codec::FramingError,
};

/// Largest body length the 15-bit length field can express.
pub const MAX_BODY_LENGTH: usize = LENGTH_MASK as usize;

/// Framer limits.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FramerConfig {
    /// Declared body lengths above this are reported as
    /// [`FramingError::MalformedLength`].
    ///
    /// Default: 32767, the largest length the wire format can express.
    pub max_body_length: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            max_body_length: MAX_BODY_LENGTH,
        }
    }
}

impl FramerConfig {
    /// Set the body length limit, clamped to [`MAX_BODY_LENGTH`].
    #[must_use]
    pub fn max_body_length(mut self, limit: usize) -> Self {
        self.max_body_length = limit.min(MAX_BODY_LENGTH);
        self
    }

    /// Size of the largest frame this configuration accepts.
    #[must_use]
    pub const fn max_frame_len(&self) -> usize {
        HEADER_LEN + self.max_body_length + CHECKSUM_LEN
    }
}

/// Result of one framing attempt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameOutcome {
    /// A verified frame was removed from the front of the buffer.
    Complete {
        /// The frame.
        frame: Frame,
        /// Bytes removed from the buffer.
        consumed: usize,
    },
    /// Not enough bytes yet; the buffer is untouched.
    Incomplete,
    /// The front of the buffer is not a valid frame.
    ///
    /// Checksum failures consume the whole frame span so framing can move on.
    /// Length failures consume nothing and leave recovery to the caller.
    Malformed {
        /// What was wrong.
        error: FramingError,
        /// Bytes removed from the buffer.
        consumed: usize,
    },
}

/// Total size of the frame at the front of `buf`, if its header is present.
#[must_use]
pub fn pending_frame_len(buf: &[u8]) -> Option<usize> {
    let raw = read_le_u16(array_at(buf, 1)?);
    Some(HEADER_LEN + usize::from(raw & LENGTH_MASK) + CHECKSUM_LEN)
}

/// Try to slice one frame off the front of `buf`.
///
/// # Examples
///
/// ```
/// use bytes::BytesMut;
/// use galileo::{
///     checksum::crc16,
///     frame::{FrameOutcome, FramerConfig, try_extract_frame},
/// };
///
/// let mut wire = vec![0x15, 0x01, 0x00, 0xAA];
/// let crc = crc16(&wire);
/// wire.extend_from_slice(&crc.to_le_bytes());
///
/// let mut buf = BytesMut::from(&wire[..2]);
/// assert_eq!(
///     try_extract_frame(&mut buf, &FramerConfig::default()),
///     FrameOutcome::Incomplete
/// );
///
/// buf.extend_from_slice(&wire[2..]);
/// let FrameOutcome::Complete { frame, consumed } =
///     try_extract_frame(&mut buf, &FramerConfig::default())
/// else {
///     panic!("frame should be complete");
/// };
/// assert_eq!(consumed, 6);
/// assert_eq!(frame.body.as_ref(), &[0xAA]);
/// assert!(buf.is_empty());
/// ```
pub fn try_extract_frame(buf: &mut BytesMut, config: &FramerConfig) -> FrameOutcome {
    let Some(raw_length) = array_at(buf, 1).map(read_le_u16) else {
        return FrameOutcome::Incomplete;
    };
    let declared = raw_length & LENGTH_MASK;
    let body_len = usize::from(declared);
    if body_len > config.max_body_length {
        return FrameOutcome::Malformed {
            error: FramingError::MalformedLength {
                declared: body_len,
                max: config.max_body_length,
            },
            consumed: 0,
        };
    }

    let checked_len = HEADER_LEN + body_len;
    let total = checked_len + CHECKSUM_LEN;
    let Some(carried) = array_at(buf, checked_len).map(read_le_u16) else {
        return FrameOutcome::Incomplete;
    };
    let computed = crc16(&buf[..checked_len]);

    let mut bytes = buf.split_to(total);
    if computed != carried {
        return FrameOutcome::Malformed {
            error: FramingError::ChecksumMismatch {
                expected: computed,
                actual: carried,
            },
            consumed: total,
        };
    }

    let header = bytes.get_u8();
    bytes.advance(HEADER_LEN - 1);
    bytes.truncate(body_len);
    FrameOutcome::Complete {
        frame: Frame {
            header,
            declared_length: declared,
            archive_pending: raw_length & ARCHIVE_PENDING_BIT != 0,
            body: bytes.freeze(),
            checksum: carried,
        },
        consumed: total,
    }
}
