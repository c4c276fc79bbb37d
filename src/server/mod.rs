//! Tokio TCP server feeding device connections through [`Session`]s.
//!
//! [`IngestServer`] accepts connections, gives each one its own task and
//! [`Session`], writes acknowledgements back to the device and hands decoded
//! records to a [`RecordSink`].
//!
//! [`Session`]: crate::session::Session

use std::sync::Arc;

use tokio::{net::TcpListener, sync::oneshot};

use crate::{sink::RecordSink, tag::TagRegistry};

/// Tokio-based ingest server.
///
/// The server carries a typestate `S` indicating whether it is [`Unbound`]
/// (not yet bound to a TCP listener) or [`Bound`]. New servers start
/// `Unbound` and must call [`IngestServer::bind`] or
/// [`IngestServer::bind_existing_listener`] before running.
///
/// # Examples
///
/// ```no_run
/// use std::sync::Arc;
///
/// use galileo::{server::IngestServer, sink::IngestEvent, tag::TagRegistry};
/// use tokio::sync::mpsc;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), galileo::server::ServerError> {
/// let (tx, _rx) = mpsc::channel::<IngestEvent>(1024);
/// IngestServer::new(Arc::new(TagRegistry::galileosky()), tx)
///     .bind(([0, 0, 0, 0], 7777).into())?
///     .run()
///     .await
/// # }
/// ```
pub struct IngestServer<K, S = Unbound>
where
    K: RecordSink + Clone + 'static,
    S: ServerState,
{
    pub(crate) tags: Arc<TagRegistry>,
    pub(crate) sink: K,
    pub(crate) config: ServerConfig,
    /// Notified once the accept loop is running.
    ///
    /// A `oneshot::Sender` can transmit only one readiness notification, so a
    /// new one must be provided each time the server is started.
    pub(crate) ready_tx: Option<oneshot::Sender<()>>,
    /// Typestate tracking whether the server has been bound to a listener.
    pub(crate) state: S,
}

/// Marker indicating the server has not yet bound a listener.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbound;

/// Marker indicating the server is bound to a TCP listener.
#[derive(Debug, Clone)]
pub struct Bound {
    pub(crate) listener: Arc<TcpListener>,
}

/// Trait implemented by [`Unbound`] and [`Bound`] to model binding typestate.
pub trait ServerState: sealed::Sealed {}

mod sealed {
    //! Prevent external implementations of [`ServerState`].

    pub trait Sealed {}
    impl Sealed for super::Unbound {}
    impl Sealed for super::Bound {}
}

impl ServerState for Unbound {}
impl ServerState for Bound {}

mod config;
pub use config::{AcceptBackoff, ServerConfig, binding};
mod connection;
pub mod error;
mod runtime;

pub use error::ServerError;
