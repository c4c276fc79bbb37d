//! Runtime control for [`IngestServer`].

mod accept;

use std::sync::Arc;

use accept::{AcceptLoopOptions, accept_loop};
use futures::Future;
use log::{info, warn};
use tokio::{select, signal};
use tokio_util::{sync::CancellationToken, task::TaskTracker};

use super::{Bound, IngestServer, ServerError};
use crate::sink::RecordSink;

impl<K> IngestServer<K, Bound>
where
    K: RecordSink + Clone + 'static,
{
    /// Run the server until a shutdown signal is received.
    ///
    /// Awaits Ctrl+C for shutdown.
    ///
    /// Attempting to run a server without binding fails to compile:
    ///
    /// ```compile_fail
    /// use std::sync::Arc;
    ///
    /// use galileo::{server::IngestServer, sink::IngestEvent, tag::TagRegistry};
    /// use tokio::sync::mpsc;
    ///
    /// async fn try_run() {
    ///     let (tx, _rx) = mpsc::channel::<IngestEvent>(1);
    ///     IngestServer::new(Arc::new(TagRegistry::galileosky()), tx)
    ///         .run()
    ///         .await
    ///         .expect("unbound servers do not expose run()");
    /// }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors.
    pub async fn run(self) -> Result<(), ServerError> {
        self.run_with_shutdown(async {
            let _ = signal::ctrl_c().await;
        })
        .await
    }

    /// Run the server until the `shutdown` future resolves.
    ///
    /// Open connections are cancelled on shutdown and each reports
    /// [`DisconnectReason::Shutdown`](crate::sink::DisconnectReason::Shutdown)
    /// before this returns.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use galileo::{server::IngestServer, sink::IngestEvent, tag::TagRegistry};
    /// use tokio::sync::{mpsc, oneshot};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> Result<(), galileo::server::ServerError> {
    /// let (events, _rx) = mpsc::channel::<IngestEvent>(64);
    /// let server = IngestServer::new(Arc::new(TagRegistry::galileosky()), events)
    ///     .bind(([127, 0, 0, 1], 0).into())?;
    ///
    /// let (tx, rx) = oneshot::channel::<()>();
    /// let handle = tokio::spawn(async move {
    ///     server
    ///         .run_with_shutdown(async {
    ///             let _ = rx.await;
    ///         })
    ///         .await
    /// });
    ///
    /// let _ = tx.send(());
    /// handle
    ///     .await
    ///     .expect("join server task")
    ///     .expect("server run failed");
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    ///
    /// Accept failures are retried with exponential back-off and do not
    /// surface as errors.
    pub async fn run_with_shutdown<S>(self, shutdown: S) -> Result<(), ServerError>
    where
        S: Future<Output = ()> + Send,
    {
        let IngestServer {
            tags,
            sink,
            config,
            ready_tx,
            state: Bound { listener },
        } = self;
        let shutdown_token = CancellationToken::new();
        let tracker = TaskTracker::new();

        if let Ok(addr) = listener.local_addr() {
            info!("listening on {addr}");
        }
        tracker.spawn(accept_loop(
            listener,
            AcceptLoopOptions {
                tags,
                sink,
                config: Arc::new(config),
                shutdown: shutdown_token.clone(),
                tracker: tracker.clone(),
            },
        ));

        if let Some(tx) = ready_tx
            && tx.send(()).is_err()
        {
            warn!("Failed to send readiness signal: receiver dropped");
        }

        select! {
            () = shutdown => shutdown_token.cancel(),
            () = tracker.wait() => {},
        }

        tracker.close();
        tracker.wait().await;
        info!("server stopped");
        Ok(())
    }
}
