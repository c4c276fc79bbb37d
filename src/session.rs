//! Per-connection protocol state.
//!
//! A [`Session`] owns the bytes received on one connection that have not yet
//! formed a frame, and the last IMEI the device announced. Each call to
//! [`Session::feed`] runs framing, classification and decoding over whatever
//! is complete and returns the resulting [`DecodedEvent`]s in device order:
//! for every frame, its records and decode issues come before its
//! acknowledgement.
//!
//! Sessions share nothing but the read-only [`TagRegistry`].

use std::{fmt, sync::Arc, time::Instant};

use bytes::{Buf, BytesMut};
use log::{debug, warn};
use thiserror::Error;

use crate::{
    codec::{DecodeIssue, EofError, FramingError, ProtocolError, RecoveryPolicy},
    frame::{
        Ack,
        Frame,
        FrameKind,
        FrameOutcome,
        FramerConfig,
        framer::pending_frame_len,
        try_extract_frame,
    },
    metrics,
    record::{DeviceRecord, MarkerScan, RecordBoundaryStrategy, RecordDecoder, segment_body},
    tag::TagRegistry,
};

pub mod registry;

pub use registry::{RegistryError, SessionRegistry};

/// Default cap on bytes buffered without completing a frame.
pub const DEFAULT_MAX_BUFFERED_BYTES: usize = 64 * 1024;

/// Identifier assigned to a connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl From<u64> for ConnectionId {
    fn from(value: u64) -> Self { Self(value) }
}

impl ConnectionId {
    /// Create a new [`ConnectionId`] with the provided value.
    #[must_use]
    pub const fn new(id: u64) -> Self { Self(id) }

    /// Return the inner `u64` representation.
    #[must_use]
    pub const fn as_u64(&self) -> u64 { self.0 }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "conn-{}", self.0) }
}

/// Session limits and recovery choices.
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Framer limits.
    pub framer: FramerConfig,
    /// Bytes that may be buffered without a complete frame before the session
    /// fails with [`FramingError::BufferLimitExceeded`].
    ///
    /// A limit below [`FramerConfig::max_frame_len`] also rejects frames too
    /// large to ever fit.
    pub max_buffered_bytes: usize,
    /// Policy for impossible length fields: [`RecoveryPolicy::Resync`] drops
    /// one byte and retries, [`RecoveryPolicy::Disconnect`] fails the session.
    pub malformed_length_policy: RecoveryPolicy,
    /// Record boundary strategy for archive batches.
    pub boundary: Arc<dyn RecordBoundaryStrategy>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            framer: FramerConfig::default(),
            max_buffered_bytes: DEFAULT_MAX_BUFFERED_BYTES,
            malformed_length_policy: RecoveryPolicy::Resync,
            boundary: Arc::new(MarkerScan),
        }
    }
}

impl SessionConfig {
    /// Set framer limits.
    #[must_use]
    pub fn framer(mut self, framer: FramerConfig) -> Self {
        self.framer = framer;
        self
    }

    /// Set the buffered-bytes cap.
    #[must_use]
    pub fn max_buffered_bytes(mut self, limit: usize) -> Self {
        self.max_buffered_bytes = limit;
        self
    }

    /// Set the malformed length policy.
    #[must_use]
    pub fn malformed_length_policy(mut self, policy: RecoveryPolicy) -> Self {
        self.malformed_length_policy = policy;
        self
    }

    /// Set the record boundary strategy.
    #[must_use]
    pub fn boundary(mut self, strategy: Arc<dyn RecordBoundaryStrategy>) -> Self {
        self.boundary = strategy;
        self
    }
}

/// Output of [`Session::feed`].
#[derive(Clone, Debug, PartialEq)]
pub enum DecodedEvent {
    /// A decoded record attributed to a device.
    Record(DeviceRecord),
    /// Bytes to write back to the device.
    AckRequired(Ack),
    /// A recoverable anomaly; the session carries on.
    ProtocolError(DecodeIssue),
}

/// Fatal failure of [`Session::feed`].
///
/// Frames completed earlier in the same call are not lost: their events are
/// handed back in `events` so the caller can still deliver the records and
/// write the acknowledgements before closing the connection.
#[derive(Clone, Debug, Error, PartialEq)]
#[error("{error}")]
pub struct FeedError {
    /// Events of frames completed before the failure, in device order.
    pub events: Vec<DecodedEvent>,
    /// What ended the session.
    pub error: FramingError,
}

/// Where a session stands between reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// Buffer empty; waiting for the next frame.
    AwaitingData,
    /// A complete frame is buffered and has not been processed yet.
    HasCompleteFrame,
    /// Part of a frame is buffered.
    Idle,
}

/// Protocol state of one connection.
#[derive(Debug)]
pub struct Session {
    id: ConnectionId,
    registry: Arc<TagRegistry>,
    config: SessionConfig,
    buffer: BytesMut,
    last_imei: Option<String>,
    resync_dropped: usize,
    created_at: Instant,
    last_activity_at: Instant,
}

impl Session {
    /// Create a session for connection `id`.
    #[must_use]
    pub fn new(id: ConnectionId, registry: Arc<TagRegistry>, config: SessionConfig) -> Self {
        let now = Instant::now();
        Self {
            id,
            registry,
            config,
            buffer: BytesMut::new(),
            last_imei: None,
            resync_dropped: 0,
            created_at: now,
            last_activity_at: now,
        }
    }

    /// Connection identifier.
    #[must_use]
    pub const fn id(&self) -> ConnectionId { self.id }

    /// Last IMEI announced on this connection.
    #[must_use]
    pub fn last_imei(&self) -> Option<&str> { self.last_imei.as_deref() }

    /// Bytes buffered without forming a frame yet.
    #[must_use]
    pub fn buffered(&self) -> usize { self.buffer.len() }

    /// When the session was created.
    #[must_use]
    pub const fn created_at(&self) -> Instant { self.created_at }

    /// When bytes were last fed.
    #[must_use]
    pub const fn last_activity_at(&self) -> Instant { self.last_activity_at }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        match pending_frame_len(&self.buffer) {
            _ if self.buffer.is_empty() => SessionState::AwaitingData,
            Some(total) if total <= self.buffer.len() => SessionState::HasCompleteFrame,
            _ => SessionState::Idle,
        }
    }

    /// Append `bytes` and process every complete frame.
    ///
    /// Reads of any size are accepted, down to a single byte; a partial frame
    /// stays buffered for the next call.
    ///
    /// # Errors
    ///
    /// Fails with [`FramingError::BufferLimitExceeded`] when the buffer
    /// outgrows the configured cap, and with [`FramingError::MalformedLength`]
    /// when the malformed length policy is [`RecoveryPolicy::Disconnect`].
    /// Both are fatal: the caller should handle [`FeedError::events`], then
    /// close the connection and drop the session.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<DecodedEvent>, FeedError> {
        self.last_activity_at = Instant::now();
        self.buffer.extend_from_slice(bytes);

        let mut events = Vec::new();
        loop {
            match try_extract_frame(&mut self.buffer, &self.config.framer) {
                FrameOutcome::Incomplete => break,
                FrameOutcome::Complete { frame, .. } => {
                    self.finish_resync();
                    self.handle_frame(&frame, &mut events);
                }
                FrameOutcome::Malformed {
                    error: error @ FramingError::MalformedLength { .. },
                    ..
                } => {
                    if let Err(error) = self.recover_length(error, &mut events) {
                        return Err(FeedError { events, error });
                    }
                }
                FrameOutcome::Malformed { error, consumed } => {
                    self.finish_resync();
                    warn!("{}: rejected {consumed} byte frame: {error}", self.id);
                    metrics::inc_errors("framing");
                    events.push(DecodedEvent::ProtocolError(error.into()));
                    events.push(DecodedEvent::AckRequired(Ack::REJECTED));
                }
            }
        }

        let limit = self.config.max_buffered_bytes;
        if self.buffer.len() > limit {
            return Err(FeedError {
                events,
                error: FramingError::BufferLimitExceeded {
                    buffered: self.buffer.len(),
                    limit,
                },
            });
        }
        Ok(events)
    }

    /// End the session, discarding any partial frame.
    #[must_use]
    pub fn close(self) -> EofError {
        if self.buffer.is_empty() {
            EofError::CleanClose
        } else {
            EofError::MidFrame {
                bytes_discarded: self.buffer.len(),
            }
        }
    }

    fn recover_length(
        &mut self,
        error: FramingError,
        events: &mut Vec<DecodedEvent>,
    ) -> Result<(), FramingError> {
        match self.config.malformed_length_policy {
            RecoveryPolicy::Disconnect => Err(error),
            RecoveryPolicy::Drop | RecoveryPolicy::Resync => {
                if self.resync_dropped == 0 {
                    warn!("{}: {error}; dropping bytes until a frame lines up", self.id);
                    metrics::inc_errors("framing");
                    events.push(DecodedEvent::ProtocolError(error.into()));
                }
                self.buffer.advance(1);
                self.resync_dropped += 1;
                Ok(())
            }
        }
    }

    fn finish_resync(&mut self) {
        if self.resync_dropped > 0 {
            debug!("{}: resynchronised after dropping {} bytes", self.id, self.resync_dropped);
            self.resync_dropped = 0;
        }
    }

    fn handle_frame(&mut self, frame: &Frame, events: &mut Vec<DecodedEvent>) {
        let kind = frame.kind();
        metrics::inc_frames(kind);
        match kind {
            FrameKind::Telemetry => self.decode_telemetry(frame, events),
            FrameKind::Ignorable => debug!("{}: keepalive", self.id),
            FrameKind::Extension(header) => {
                debug!(
                    "{}: passing through frame type {header:#04x} ({} bytes)",
                    self.id, frame.declared_length
                );
            }
        }
        events.push(DecodedEvent::AckRequired(frame.ack()));
    }

    fn decode_telemetry(&mut self, frame: &Frame, events: &mut Vec<DecodedEvent>) {
        let registry = Arc::clone(&self.registry);
        let decoder = RecordDecoder::new(&registry);
        let segments = segment_body(&frame.body, self.config.boundary.as_ref(), &registry);

        if let Some(prelude) = segments.prelude {
            let decoded = decoder.decode_range(&frame.body, prelude);
            self.report(decoded.errors, events);
            self.remember_imei(decoded.record.imei());
        }

        for range in segments.records {
            let decoded = decoder.decode_range(&frame.body, range);
            self.report(decoded.errors, events);
            if decoded.record.is_empty() {
                continue;
            }
            self.remember_imei(decoded.record.imei());
            metrics::inc_records();
            events.push(DecodedEvent::Record(DeviceRecord {
                imei: self.last_imei.clone(),
                archive_pending: frame.archive_pending,
                record: decoded.record,
            }));
        }
    }

    fn remember_imei(&mut self, imei: Option<&str>) {
        if let Some(imei) = imei
            && self.last_imei.as_deref() != Some(imei)
        {
            debug!("{}: device identified as {imei}", self.id);
            self.last_imei = Some(imei.to_owned());
        }
    }

    fn report(&self, errors: Vec<ProtocolError>, events: &mut Vec<DecodedEvent>) {
        for error in errors {
            metrics::inc_errors("protocol");
            events.push(DecodedEvent::ProtocolError(error.into()));
        }
    }
}

#[cfg(test)]
mod tests;
