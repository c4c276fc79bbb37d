//! Recovery policies for codec errors.

/// How a session responds to a codec error.
///
/// [`CodecError::default_recovery_policy`](crate::codec::CodecError::default_recovery_policy)
/// returns the recommended policy for each error. The policy applied to
/// malformed length fields can be overridden through
/// [`SessionConfig::malformed_length_policy`](crate::session::SessionConfig::malformed_length_policy).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RecoveryPolicy {
    /// Discard the offending frame or tag and continue.
    ///
    /// Used for checksum mismatches (the frame span is consumed and the
    /// rejection ack is sent) and for tag-level decode anomalies.
    #[default]
    Drop,

    /// Drop a single byte and retry framing from the next offset.
    ///
    /// Applied to impossible length fields. This is lossy: every byte of a
    /// corrupt region is skipped one at a time until something that looks
    /// like a frame header lines up again.
    Resync,

    /// Terminate the connection and discard the buffer.
    Disconnect,
}

impl RecoveryPolicy {
    /// Returns the policy name as a static string for metrics and logging.
    ///
    /// # Examples
    ///
    /// ```
    /// use galileo::codec::RecoveryPolicy;
    ///
    /// assert_eq!(RecoveryPolicy::Drop.as_str(), "drop");
    /// assert_eq!(RecoveryPolicy::Resync.as_str(), "resync");
    /// assert_eq!(RecoveryPolicy::Disconnect.as_str(), "disconnect");
    /// ```
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Drop => "drop",
            Self::Resync => "resync",
            Self::Disconnect => "disconnect",
        }
    }
}
