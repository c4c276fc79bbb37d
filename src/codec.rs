//! Error taxonomy and recovery policies shared by the framer, the record
//! decoder and the session layer.
//!
//! # Error Handling
//!
//! [`CodecError`] distinguishes framing errors, protocol errors, I/O errors and
//! EOF conditions. See the [`error`] module for details.
//!
//! Recovery policies determine how errors are handled:
//!
//! - [`RecoveryPolicy::Drop`]: Discard the malformed frame or tag and continue.
//! - [`RecoveryPolicy::Resync`]: Drop one byte and retry framing.
//! - [`RecoveryPolicy::Disconnect`]: Terminate the connection.

pub mod error;
pub mod recovery;

pub use error::{CodecError, DecodeIssue, EofError, FramingError, ProtocolError};
pub use recovery::RecoveryPolicy;
