//! Configuration utilities for [`IngestServer`].

use std::{sync::Arc, time::Duration};

use tokio::sync::oneshot;

use super::{IngestServer, ServerState, Unbound};
use crate::{session::SessionConfig, sink::RecordSink, tag::TagRegistry};

pub mod binding;

/// Default time a connection may stay silent before it is closed.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(120);

/// Default size of the per-connection read buffer.
pub const DEFAULT_READ_BUFFER_SIZE: usize = 4096;

/// Shortest retry delay the accept loop will sleep.
const MIN_ACCEPT_DELAY: Duration = Duration::from_millis(1);

/// How long the accept loop waits after `accept()` fails.
///
/// Trackers reconnect aggressively after a server restart, so descriptor
/// exhaustion shows up as bursts of accept errors. The first retry waits
/// [`initial`](Self::initial); each further consecutive failure doubles the
/// wait up to [`max`](Self::max). The next accepted connection resets it.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use galileo::server::AcceptBackoff;
///
/// let backoff = AcceptBackoff::new(Duration::ZERO, Duration::ZERO);
/// assert_eq!(backoff.initial(), Duration::from_millis(1));
/// assert_eq!(backoff.max(), Duration::from_millis(1));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AcceptBackoff {
    initial: Duration,
    max: Duration,
}

impl Default for AcceptBackoff {
    fn default() -> Self { Self::new(Duration::from_millis(10), Duration::from_secs(1)) }
}

impl AcceptBackoff {
    /// Back-off starting at `initial` and capped at `max`.
    ///
    /// Both are raised to at least one millisecond, and `max` to at least
    /// `initial`.
    #[must_use]
    pub fn new(initial: Duration, max: Duration) -> Self {
        let initial = initial.max(MIN_ACCEPT_DELAY);
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Wait after the first failure.
    #[must_use]
    pub const fn initial(&self) -> Duration { self.initial }

    /// Longest wait between retries.
    #[must_use]
    pub const fn max(&self) -> Duration { self.max }
}

/// Server-wide settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Settings applied to every connection's session.
    pub session: SessionConfig,
    /// A connection with no bytes for this long is closed.
    pub read_timeout: Duration,
    /// Bytes requested per socket read.
    pub read_buffer_size: usize,
    /// Accept-loop retry timing.
    pub backoff: AcceptBackoff,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            read_timeout: DEFAULT_READ_TIMEOUT,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            backoff: AcceptBackoff::default(),
        }
    }
}

impl ServerConfig {
    /// Set the session settings.
    #[must_use]
    pub fn session(mut self, session: SessionConfig) -> Self {
        self.session = session;
        self
    }

    /// Set the idle read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the read buffer size; at least one byte.
    #[must_use]
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size.max(1);
        self
    }

    /// Set the accept-loop back-off.
    #[must_use]
    pub fn backoff(mut self, backoff: AcceptBackoff) -> Self {
        self.backoff = backoff;
        self
    }
}

impl<K> IngestServer<K, Unbound>
where
    K: RecordSink + Clone + 'static,
{
    /// Create a server decoding with `tags` and delivering to `sink`.
    ///
    /// The listener is unset; call [`bind`](Self::bind) before running the
    /// server.
    #[must_use]
    pub fn new(tags: Arc<TagRegistry>, sink: K) -> Self {
        Self {
            tags,
            sink,
            config: ServerConfig::default(),
            ready_tx: None,
            state: Unbound,
        }
    }
}

impl<K, S> IngestServer<K, S>
where
    K: RecordSink + Clone + 'static,
    S: ServerState,
{
    /// Replace the server settings.
    #[must_use]
    pub fn with_config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Configure a channel used to signal when the server is ready to accept
    /// connections.
    #[must_use]
    pub fn ready_signal(mut self, tx: oneshot::Sender<()>) -> Self {
        self.ready_tx = Some(tx);
        self
    }

    /// Current settings.
    #[must_use]
    pub const fn config(&self) -> &ServerConfig { &self.config }

    /// Tag table shared by all connections.
    #[must_use]
    pub fn tags(&self) -> &Arc<TagRegistry> { &self.tags }
}
