//! Delivery of decoded records out of the server.
//!
//! Every connection reports through a [`RecordSink`]: a [`IngestEvent::Connected`]
//! when it opens, one [`IngestEvent::Record`] per decoded record, and a final
//! [`IngestEvent::Disconnected`] carrying the [`DisconnectReason`].
//!
//! `tokio::sync::mpsc` senders are sinks out of the box:
//!
//! ```
//! use galileo::{
//!     session::ConnectionId,
//!     sink::{IngestEvent, RecordSink},
//! };
//! use tokio::sync::mpsc;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let (tx, mut rx) = mpsc::channel(8);
//! tx.deliver(IngestEvent::Connected {
//!     connection: ConnectionId::new(1),
//!     peer: None,
//! })
//! .await
//! .expect("receiver is alive");
//! assert!(matches!(rx.recv().await, Some(IngestEvent::Connected { .. })));
//! # }
//! ```

use std::{io, net::SocketAddr};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::{codec::FramingError, record::DeviceRecord, session::ConnectionId};

/// Lifecycle and data events of one connection.
#[derive(Clone, Debug, PartialEq)]
pub enum IngestEvent {
    /// A device connected.
    Connected {
        /// Connection the event belongs to.
        connection: ConnectionId,
        /// Remote address, when the transport exposes one.
        peer: Option<SocketAddr>,
    },
    /// A record was decoded.
    Record {
        /// Connection the event belongs to.
        connection: ConnectionId,
        /// The record with its device attribution.
        record: DeviceRecord,
    },
    /// The connection ended.
    Disconnected {
        /// Connection the event belongs to.
        connection: ConnectionId,
        /// Why it ended.
        reason: DisconnectReason,
    },
}

impl IngestEvent {
    /// Connection the event belongs to.
    #[must_use]
    pub const fn connection(&self) -> ConnectionId {
        match self {
            Self::Connected { connection, .. }
            | Self::Record { connection, .. }
            | Self::Disconnected { connection, .. } => *connection,
        }
    }
}

/// Why a connection ended.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DisconnectReason {
    /// The device closed the connection between frames.
    PeerClosed,
    /// The device closed the connection part way through a frame.
    MidFrame {
        /// Buffered bytes that never formed a frame.
        bytes_discarded: usize,
    },
    /// No bytes arrived within the read timeout.
    Timeout,
    /// Reading or writing the socket failed.
    #[serde(serialize_with = "serialize_kind")]
    Io(io::ErrorKind),
    /// The session hit a fatal framing error.
    #[serde(serialize_with = "serialize_display")]
    Framing(FramingError),
    /// The server is shutting down.
    Shutdown,
    /// The sink stopped accepting events.
    SinkClosed,
    /// The connection task panicked.
    Panicked,
}

fn serialize_kind<S: serde::Serializer>(kind: &io::ErrorKind, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(kind)
}

fn serialize_display<S: serde::Serializer>(error: &FramingError, s: S) -> Result<S::Ok, S::Error> {
    s.collect_str(error)
}

/// The receiving side of a sink has gone away.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
#[error("record sink closed")]
pub struct SinkClosed;

/// Destination for [`IngestEvent`]s.
///
/// Implementations may apply back-pressure by awaiting; a connection does not
/// read further bytes until its events are accepted.
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Hand over one event.
    ///
    /// # Errors
    ///
    /// Returns [`SinkClosed`] when the sink can no longer accept events. The
    /// connection that produced the event is then closed.
    async fn deliver(&self, event: IngestEvent) -> Result<(), SinkClosed>;
}

#[async_trait]
impl RecordSink for mpsc::Sender<IngestEvent> {
    async fn deliver(&self, event: IngestEvent) -> Result<(), SinkClosed> {
        self.send(event).await.map_err(|_| SinkClosed)
    }
}

#[async_trait]
impl RecordSink for mpsc::UnboundedSender<IngestEvent> {
    async fn deliver(&self, event: IngestEvent) -> Result<(), SinkClosed> {
        self.send(event).map_err(|_| SinkClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dropped_receiver_closes_bounded_sink() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let event = IngestEvent::Disconnected {
            connection: ConnectionId::new(2),
            reason: DisconnectReason::Timeout,
        };
        assert_eq!(tx.deliver(event).await, Err(SinkClosed));
    }

    #[tokio::test]
    async fn unbounded_sink_forwards_events() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let event = IngestEvent::Connected {
            connection: ConnectionId::new(5),
            peer: None,
        };
        tx.deliver(event.clone()).await.expect("deliver");
        assert_eq!(rx.recv().await, Some(event));
    }

    #[test]
    fn event_reports_its_connection() {
        let event = IngestEvent::Disconnected {
            connection: ConnectionId::new(9),
            reason: DisconnectReason::MidFrame { bytes_discarded: 3 },
        };
        assert_eq!(event.connection(), ConnectionId::new(9));
    }

    #[test]
    fn reasons_serialise_in_snake_case() {
        let json = serde_json::to_value(DisconnectReason::Io(io::ErrorKind::ConnectionReset))
            .expect("serialise");
        assert_eq!(json, serde_json::json!({ "io": "connection reset" }));
        let json = serde_json::to_value(DisconnectReason::PeerClosed).expect("serialise");
        assert_eq!(json, serde_json::json!("peer_closed"));
    }
}
