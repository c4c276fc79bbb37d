//! Error types for the codec layer.
//!
//! This module provides a structured error taxonomy that distinguishes between
//! framing errors (frame boundary and integrity issues), protocol errors
//! (problems inside a frame body after it was delimited), I/O errors, and EOF
//! conditions.
//!
//! # Error Categories
//!
//! - [`FramingError`]: Wire-level issues such as checksum mismatches, impossible declared lengths,
//!   or a buffer that grows without ever completing a frame.
//! - [`ProtocolError`]: Tag-level anomalies found while decoding a record (unknown tags, values
//!   running past the end of the record).
//! - [`EofError`]: End-of-stream conditions distinguishing clean closure from a partial frame left
//!   in the buffer.
//! - [`CodecError`]: Top-level enum wrapping all categories plus I/O errors.
//!
//! An incomplete frame is not an error: the framer reports it as
//! [`FrameOutcome::Incomplete`](crate::frame::FrameOutcome::Incomplete) and the
//! caller waits for more bytes.

use std::io;

use thiserror::Error;

use super::recovery::RecoveryPolicy;
use crate::tag::TagId;

/// Framing-level errors occurring while delimiting frames.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FramingError {
    /// Trailing checksum does not match the CRC of header, length and body.
    #[error("frame checksum mismatch: expected {expected:#06x}, got {actual:#06x}")]
    ChecksumMismatch {
        /// Checksum computed over the received bytes.
        expected: u16,
        /// Checksum carried by the frame trailer.
        actual: u16,
    },

    /// Declared body length exceeds what the framer accepts.
    #[error("declared body length {declared} exceeds limit {max}")]
    MalformedLength {
        /// Body length taken from the length field.
        declared: usize,
        /// Largest body length the framer accepts.
        max: usize,
    },

    /// Buffered bytes grew past the limit without completing a frame.
    #[error("{buffered} bytes buffered without a complete frame (limit {limit})")]
    BufferLimitExceeded {
        /// Bytes currently held by the session.
        buffered: usize,
        /// Configured limit.
        limit: usize,
    },
}

/// Protocol-level errors found while decoding a record body.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    /// Tag identifier missing from the registry.
    #[error("unknown tag {tag} at offset {offset}, skipped {skipped} bytes")]
    UnknownTag {
        /// Identifier that was not recognised.
        tag: TagId,
        /// Offset of the tag identifier inside the frame body.
        offset: usize,
        /// Bytes skipped in place of the unknown value.
        skipped: usize,
    },

    /// A tag value runs past the end of its record or extended block.
    #[error("tag {tag} at offset {offset} needs {needed} bytes, {remaining} remain")]
    TruncatedValue {
        /// Tag whose value was cut short.
        tag: TagId,
        /// Offset of the tag identifier inside the frame body.
        offset: usize,
        /// Width required by the tag's decode kind.
        needed: usize,
        /// Bytes left before the record (or block) end.
        remaining: usize,
    },
}

/// A recoverable anomaly reported alongside decoded output.
///
/// Unlike [`CodecError`] this is cloneable and comparable, so it can travel
/// inside session events.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DecodeIssue {
    /// A frame was rejected or bytes were skipped while delimiting.
    #[error(transparent)]
    Framing(#[from] FramingError),
    /// A tag inside a record could not be decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl DecodeIssue {
    /// Short machine-readable name of the anomaly.
    ///
    /// # Examples
    ///
    /// ```
    /// use galileo::codec::{DecodeIssue, FramingError};
    ///
    /// let issue = DecodeIssue::from(FramingError::ChecksumMismatch {
    ///     expected: 1,
    ///     actual: 2,
    /// });
    /// assert_eq!(issue.kind(), "checksum_mismatch");
    /// ```
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Framing(FramingError::ChecksumMismatch { .. }) => "checksum_mismatch",
            Self::Framing(FramingError::MalformedLength { .. }) => "malformed_length",
            Self::Framing(FramingError::BufferLimitExceeded { .. }) => "buffer_limit_exceeded",
            Self::Protocol(ProtocolError::UnknownTag { .. }) => "unknown_tag",
            Self::Protocol(ProtocolError::TruncatedValue { .. }) => "truncated_value",
        }
    }
}

impl From<DecodeIssue> for CodecError {
    fn from(issue: DecodeIssue) -> Self {
        match issue {
            DecodeIssue::Framing(e) => Self::Framing(e),
            DecodeIssue::Protocol(e) => Self::Protocol(e),
        }
    }
}

/// EOF handling variants distinguishing normal vs. premature closure.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum EofError {
    /// The peer closed the connection with no partial frame buffered.
    #[error("connection closed cleanly at frame boundary")]
    CleanClose,

    /// The peer closed the connection with a partial frame buffered.
    #[error("premature EOF: {bytes_discarded} buffered bytes discarded")]
    MidFrame {
        /// Bytes of the incomplete frame that were dropped.
        bytes_discarded: usize,
    },
}

/// Top-level codec error taxonomy.
///
/// # Examples
///
/// ```
/// use galileo::codec::{CodecError, FramingError, RecoveryPolicy};
///
/// let err = CodecError::Framing(FramingError::ChecksumMismatch {
///     expected: 0x1234,
///     actual: 0x4321,
/// });
///
/// assert_eq!(err.default_recovery_policy(), RecoveryPolicy::Drop);
/// assert!(!err.should_disconnect());
/// ```
#[derive(Debug, Error)]
pub enum CodecError {
    /// Framing layer error.
    #[error("framing error: {0}")]
    Framing(#[from] FramingError),

    /// Record decoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Transport layer I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// End-of-stream handling.
    #[error("EOF: {0}")]
    Eof(#[from] EofError),
}

impl CodecError {
    /// Returns the recommended recovery policy for this error.
    ///
    /// | Error | Policy |
    /// |-------|--------|
    /// | `Framing::ChecksumMismatch` | `Drop` |
    /// | `Framing::MalformedLength` | `Resync` |
    /// | `Framing::BufferLimitExceeded` | `Disconnect` |
    /// | All `Protocol` errors | `Drop` |
    /// | All `Io` and `Eof` errors | `Disconnect` |
    ///
    /// # Examples
    ///
    /// ```
    /// use galileo::codec::{CodecError, FramingError, RecoveryPolicy};
    ///
    /// let err = CodecError::Framing(FramingError::MalformedLength {
    ///     declared: 40_000,
    ///     max: 32_767,
    /// });
    /// assert_eq!(err.default_recovery_policy(), RecoveryPolicy::Resync);
    ///
    /// let err = CodecError::Io(std::io::Error::other("connection reset"));
    /// assert_eq!(err.default_recovery_policy(), RecoveryPolicy::Disconnect);
    /// ```
    #[must_use]
    pub fn default_recovery_policy(&self) -> RecoveryPolicy {
        match self {
            Self::Framing(FramingError::ChecksumMismatch { .. }) | Self::Protocol(_) => {
                RecoveryPolicy::Drop
            }
            Self::Framing(FramingError::MalformedLength { .. }) => RecoveryPolicy::Resync,
            Self::Framing(FramingError::BufferLimitExceeded { .. }) | Self::Io(_) | Self::Eof(_) => {
                RecoveryPolicy::Disconnect
            }
        }
    }

    /// Returns true if this error represents a clean connection close.
    #[must_use]
    pub fn is_clean_close(&self) -> bool { matches!(self, Self::Eof(EofError::CleanClose)) }

    /// Returns true if the default policy terminates the connection.
    #[must_use]
    pub fn should_disconnect(&self) -> bool {
        self.default_recovery_policy() == RecoveryPolicy::Disconnect
    }

    /// Returns the error category as a string for logging and metrics.
    ///
    /// One of `"framing"`, `"protocol"`, `"io"`, or `"eof"`.
    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::Framing(_) => "framing",
            Self::Protocol(_) => "protocol",
            Self::Io(_) => "io",
            Self::Eof(_) => "eof",
        }
    }
}

impl From<CodecError> for io::Error {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => e,
            CodecError::Framing(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Protocol(e) => io::Error::new(io::ErrorKind::InvalidData, e),
            CodecError::Eof(e) => io::Error::new(io::ErrorKind::UnexpectedEof, e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
