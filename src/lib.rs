#![doc(html_root_url = "https://docs.rs/galileo/latest")]
//! Ingest library for Galileosky GPS trackers.
//!
//! Trackers connect over TCP and stream length-prefixed, CRC-protected frames
//! whose bodies are sequences of tag/value pairs. This crate provides the
//! pieces needed to terminate such connections:
//!
//! - [`frame`] delimits frames and builds acknowledgements.
//! - [`tag`] holds the tag table and value decoders.
//! - [`record`] walks frame bodies into [`record::Record`]s, splitting archive
//!   batches.
//! - [`session`] ties these together per connection.
//! - [`server`] runs sessions over tokio TCP connections and delivers records
//!   to a [`sink::RecordSink`].

pub mod byte_order;
pub mod checksum;
pub mod codec;
pub mod frame;
pub mod metrics;
pub mod record;
pub mod server;
pub mod session;
pub mod sink;
pub mod tag;

pub use codec::{CodecError, DecodeIssue, FramingError, ProtocolError};
pub use frame::{Ack, Frame, FrameKind};
pub use metrics::{CONNECTIONS_ACTIVE, ERRORS_TOTAL, FRAMES_TOTAL, RECORDS_TOTAL};
pub use record::{DeviceRecord, Record};
pub use server::{IngestServer, ServerConfig, ServerError};
pub use session::{ConnectionId, DecodedEvent, FeedError, Session, SessionConfig, SessionRegistry};
pub use sink::{DisconnectReason, IngestEvent, RecordSink};
pub use tag::{TagId, TagRegistry, TagValue};
