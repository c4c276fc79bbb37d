//! Accept-loop utilities for server runtime.

use std::{
    io,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use async_trait::async_trait;
use log::warn;
use tokio::{
    net::{TcpListener, TcpStream},
    select,
    time::{Duration, sleep},
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use crate::{
    metrics,
    server::{
        AcceptBackoff,
        ServerConfig,
        connection::{ConnectionContext, spawn_connection_task},
    },
    session::ConnectionId,
    sink::RecordSink,
    tag::TagRegistry,
};

/// Abstraction for sources of incoming connections consumed by the accept loop.
///
/// Implementations must be cancellation-safe: dropping a pending `accept()`
/// future must not leak resources.
#[async_trait]
pub(in crate::server) trait AcceptListener: Send + Sync {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)>;
    fn local_addr(&self) -> io::Result<SocketAddr>;
}

#[async_trait]
impl AcceptListener for TcpListener {
    async fn accept(&self) -> io::Result<(TcpStream, SocketAddr)> {
        TcpListener::accept(self).await
    }

    fn local_addr(&self) -> io::Result<SocketAddr> { TcpListener::local_addr(self) }
}

/// Shared state handed to every connection spawned by the loop.
pub(in crate::server) struct AcceptLoopOptions<K> {
    pub tags: Arc<TagRegistry>,
    pub sink: K,
    pub config: Arc<ServerConfig>,
    pub shutdown: CancellationToken,
    pub tracker: TaskTracker,
}

/// Consecutive accept failures and the wait they have earned.
#[derive(Debug)]
pub(super) struct RetryDelay {
    policy: AcceptBackoff,
    next: Duration,
}

impl RetryDelay {
    pub(super) fn new(policy: AcceptBackoff) -> Self {
        Self {
            policy,
            next: policy.initial(),
        }
    }

    /// Wait owed for the failure just seen; doubles the one after it.
    pub(super) fn failed(&mut self) -> Duration {
        let wait = self.next;
        self.next = wait.saturating_mul(2).min(self.policy.max());
        wait
    }

    /// Forget earlier failures.
    pub(super) fn reset(&mut self) { self.next = self.policy.initial(); }
}

/// Accepts incoming connections and spawns handler tasks.
///
/// Each accepted connection gets the next [`ConnectionId`], counting from 1,
/// and its own task. Accept failures are retried after the wait set by
/// [`AcceptBackoff`]. The loop ends when `shutdown` is cancelled; spawned
/// tasks are tracked by `tracker` so shutdown can wait for them.
pub(in crate::server) async fn accept_loop<K, L>(listener: Arc<L>, options: AcceptLoopOptions<K>)
where
    K: RecordSink + Clone + 'static,
    L: AcceptListener + 'static,
{
    let next_id = AtomicU64::new(1);
    let mut retry = RetryDelay::new(options.config.backoff);
    while accept_iteration(listener.as_ref(), &options, &next_id, &mut retry).await {}
}

/// Accept or fail once. Returns `false` once shutdown has been requested.
async fn accept_iteration<K, L>(
    listener: &L,
    options: &AcceptLoopOptions<K>,
    next_id: &AtomicU64,
    retry: &mut RetryDelay,
) -> bool
where
    K: RecordSink + Clone + 'static,
    L: AcceptListener + 'static,
{
    select! {
        biased;

        () = options.shutdown.cancelled() => false,
        res = listener.accept() => {
            match res {
                Ok((stream, peer)) => {
                    let ctx = ConnectionContext {
                        id: ConnectionId::new(next_id.fetch_add(1, Ordering::Relaxed)),
                        peer: Some(peer),
                        tags: Arc::clone(&options.tags),
                        config: Arc::clone(&options.config),
                        sink: options.sink.clone(),
                        shutdown: options.shutdown.child_token(),
                    };
                    spawn_connection_task(stream, ctx, &options.tracker);
                    retry.reset();
                }
                Err(e) => {
                    let wait = retry.failed();
                    let local_addr = listener.local_addr().ok();
                    warn!("accept failed on {local_addr:?}: {e}; retrying in {wait:?}");
                    metrics::inc_errors("accept");
                    sleep(wait).await;
                }
            }
            true
        }
    }
}
