//! Connection handling for [`IngestServer`](super::IngestServer).

use std::{any::Any, net::SocketAddr, panic::AssertUnwindSafe, sync::Arc};

use futures::FutureExt;
use log::{debug, error, info, warn};
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    select,
    time::timeout,
};
use tokio_util::{sync::CancellationToken, task::TaskTracker};
use tracing::Instrument;

use super::ServerConfig;
use crate::{
    codec::EofError,
    metrics,
    session::{ConnectionId, DecodedEvent, FeedError, Session},
    sink::{DisconnectReason, IngestEvent, RecordSink},
    tag::TagRegistry,
};

/// Everything a connection task needs besides its stream.
pub(super) struct ConnectionContext<K> {
    pub id: ConnectionId,
    pub peer: Option<SocketAddr>,
    pub tags: Arc<TagRegistry>,
    pub config: Arc<ServerConfig>,
    pub sink: K,
    pub shutdown: CancellationToken,
}

/// Spawn a task to process a single TCP connection, logging and discarding any panics.
pub(super) fn spawn_connection_task<K>(
    stream: TcpStream,
    ctx: ConnectionContext<K>,
    tracker: &TaskTracker,
) where
    K: RecordSink + Clone + 'static,
{
    let id = ctx.id;
    let peer_addr = ctx.peer;
    let sink = ctx.sink.clone();
    let span = tracing::info_span!("connection", %id, ?peer_addr);
    tracker.spawn(
        async move {
            metrics::inc_connections();
            let fut = AssertUnwindSafe(process_stream(stream, ctx)).catch_unwind();

            if let Err(panic) = fut.await {
                metrics::inc_errors("panic");
                let panic_msg = panic_message(&*panic);
                error!("connection task panicked: panic={panic_msg}, peer_addr={peer_addr:?}");
                let event = IngestEvent::Disconnected {
                    connection: id,
                    reason: DisconnectReason::Panicked,
                };
                if sink.deliver(event).await.is_err() {
                    debug!("{id}: sink closed before the panic could be reported");
                }
            }
            metrics::dec_connections();
        }
        .instrument(span),
    );
}

/// Drive one connection until it ends and report why.
///
/// Every read is fed to a fresh [`Session`]; records go to the sink and
/// acknowledgements are written and flushed before the next read. When the
/// session fails, frames completed before the failure are still delivered
/// and acknowledged before the connection closes.
pub(super) async fn process_stream<St, K>(mut stream: St, ctx: ConnectionContext<K>) -> DisconnectReason
where
    St: AsyncRead + AsyncWrite + Unpin,
    K: RecordSink,
{
    let ConnectionContext {
        id,
        peer,
        tags,
        config,
        sink,
        shutdown,
    } = ctx;

    let connected = IngestEvent::Connected {
        connection: id,
        peer,
    };
    if sink.deliver(connected).await.is_err() {
        warn!("{id}: record sink closed; dropping connection from {peer:?}");
        return DisconnectReason::SinkClosed;
    }
    info!("{id}: connected from {peer:?}");

    let mut session = Session::new(id, tags, config.session.clone());
    let mut buf = vec![0; config.read_buffer_size];
    let exit = loop {
        let read = select! {
            biased;

            () = shutdown.cancelled() => break Some(DisconnectReason::Shutdown),
            read = timeout(config.read_timeout, stream.read(&mut buf)) => read,
        };
        let n = match read {
            Err(_) => break Some(DisconnectReason::Timeout),
            Ok(Err(e)) => break Some(DisconnectReason::Io(e.kind())),
            Ok(Ok(0)) => break None,
            Ok(Ok(n)) => n,
        };
        let (events, fatal) = match session.feed(&buf[..n]) {
            Ok(events) => (events, None),
            Err(FeedError { events, error }) => {
                warn!("{id}: closing connection: {error}");
                metrics::inc_errors("framing");
                (events, Some(error))
            }
        };
        if let Err(reason) = dispatch(&mut stream, &sink, id, events).await {
            break Some(reason);
        }
        if let Some(error) = fatal {
            break Some(DisconnectReason::Framing(error));
        }
    };

    let reason = match (exit, session.close()) {
        (None, EofError::CleanClose) => DisconnectReason::PeerClosed,
        (None, EofError::MidFrame { bytes_discarded }) => {
            DisconnectReason::MidFrame { bytes_discarded }
        }
        (Some(reason), EofError::CleanClose) => reason,
        (Some(reason), EofError::MidFrame { bytes_discarded }) => {
            debug!("{id}: discarded {bytes_discarded} buffered bytes");
            reason
        }
    };
    info!("{id}: disconnected: {reason:?}");

    let disconnected = IngestEvent::Disconnected {
        connection: id,
        reason: reason.clone(),
    };
    if sink.deliver(disconnected).await.is_err() {
        debug!("{id}: sink closed before disconnect was reported");
    }
    reason
}

async fn dispatch<St, K>(
    stream: &mut St,
    sink: &K,
    id: ConnectionId,
    events: Vec<DecodedEvent>,
) -> Result<(), DisconnectReason>
where
    St: AsyncWrite + Unpin,
    K: RecordSink,
{
    for event in events {
        match event {
            DecodedEvent::Record(record) => sink
                .deliver(IngestEvent::Record {
                    connection: id,
                    record,
                })
                .await
                .map_err(|_| DisconnectReason::SinkClosed)?,
            DecodedEvent::AckRequired(ack) => {
                stream
                    .write_all(ack.as_bytes())
                    .await
                    .map_err(|e| DisconnectReason::Io(e.kind()))?;
                stream
                    .flush()
                    .await
                    .map_err(|e| DisconnectReason::Io(e.kind()))?;
            }
            DecodedEvent::ProtocolError(issue) => debug!("{id}: {}: {issue}", issue.kind()),
        }
    }
    Ok(())
}

/// Render a panic payload for logging.
///
/// The payload is downcast to `String` or `&'static str` if possible and falls
/// back to `Debug` formatting otherwise.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_owned()
    } else {
        format!("{payload:?}")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use rstest::{fixture, rstest};
    use tokio::{
        io::{DuplexStream, duplex},
        sync::mpsc,
    };

    use super::*;
    use crate::{
        checksum::crc16,
        codec::{FramingError, RecoveryPolicy},
        frame::FramerConfig,
        session::SessionConfig,
    };

    type Events = mpsc::Receiver<IngestEvent>;

    fn frame(body: &[u8]) -> Vec<u8> {
        let len = u16::try_from(body.len()).expect("short body");
        let mut out = vec![0x01];
        out.extend_from_slice(&len.to_le_bytes());
        out.extend_from_slice(body);
        let crc = crc16(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    fn context(config: ServerConfig) -> (ConnectionContext<mpsc::Sender<IngestEvent>>, Events) {
        let (tx, rx) = mpsc::channel(16);
        let ctx = ConnectionContext {
            id: ConnectionId::new(1),
            peer: None,
            tags: Arc::new(TagRegistry::galileosky()),
            config: Arc::new(config),
            sink: tx,
            shutdown: CancellationToken::new(),
        };
        (ctx, rx)
    }

    #[fixture]
    fn pipe() -> (DuplexStream, DuplexStream) { duplex(256) }

    async fn drain(mut rx: Events) -> Vec<IngestEvent> {
        let mut out = Vec::new();
        while let Some(event) = rx.recv().await {
            out.push(event);
        }
        out
    }

    #[rstest]
    #[tokio::test]
    async fn acknowledges_frames_and_delivers_records(pipe: (DuplexStream, DuplexStream)) {
        let (mut device, server) = pipe;
        let (ctx, rx) = context(ServerConfig::default());
        let wire = frame(&[0x35, 0x07]);

        let task = tokio::spawn(process_stream(server, ctx));
        device.write_all(&wire).await.expect("write frame");
        let mut ack = [0; 3];
        device.read_exact(&mut ack).await.expect("read ack");
        drop(device);

        assert_eq!(ack, [0x02, wire[wire.len() - 2], wire[wire.len() - 1]]);
        assert_eq!(task.await.expect("join"), DisconnectReason::PeerClosed);
        let events = drain(rx).await;
        assert_eq!(events.len(), 3);
        assert!(matches!(events[0], IngestEvent::Connected { .. }));
        assert!(matches!(events[1], IngestEvent::Record { .. }));
        assert_eq!(
            events[2],
            IngestEvent::Disconnected {
                connection: ConnectionId::new(1),
                reason: DisconnectReason::PeerClosed,
            }
        );
    }

    #[rstest]
    #[tokio::test]
    async fn partial_frame_at_eof_is_reported(pipe: (DuplexStream, DuplexStream)) {
        let (mut device, server) = pipe;
        let (ctx, _rx) = context(ServerConfig::default());
        let task = tokio::spawn(process_stream(server, ctx));

        device.write_all(&[0x01, 0x05, 0x00, 0x35]).await.expect("write");
        drop(device);

        assert_eq!(
            task.await.expect("join"),
            DisconnectReason::MidFrame { bytes_discarded: 4 }
        );
    }

    #[rstest]
    #[tokio::test(start_paused = true)]
    async fn silent_connection_times_out(pipe: (DuplexStream, DuplexStream)) {
        let (_device, server) = pipe;
        let (ctx, _rx) = context(ServerConfig::default().read_timeout(Duration::from_secs(1)));

        let reason = process_stream(server, ctx).await;
        assert_eq!(reason, DisconnectReason::Timeout);
    }

    #[rstest]
    #[tokio::test]
    async fn cancellation_ends_the_connection(pipe: (DuplexStream, DuplexStream)) {
        let (_device, server) = pipe;
        let (ctx, _rx) = context(ServerConfig::default());
        ctx.shutdown.cancel();

        assert_eq!(process_stream(server, ctx).await, DisconnectReason::Shutdown);
    }

    #[rstest]
    #[tokio::test]
    async fn closed_sink_refuses_the_connection(pipe: (DuplexStream, DuplexStream)) {
        let (_device, server) = pipe;
        let (ctx, rx) = context(ServerConfig::default());
        drop(rx);

        assert_eq!(process_stream(server, ctx).await, DisconnectReason::SinkClosed);
    }

    #[rstest]
    #[tokio::test]
    async fn fatal_framing_error_drops_the_connection(pipe: (DuplexStream, DuplexStream)) {
        let (mut device, server) = pipe;
        let session = SessionConfig::default()
            .framer(FramerConfig::default().max_body_length(8))
            .malformed_length_policy(RecoveryPolicy::Disconnect);
        let (ctx, _rx) = context(ServerConfig::default().session(session));
        let task = tokio::spawn(process_stream(server, ctx));

        device.write_all(&[0x01, 0x40, 0x00]).await.expect("write");

        assert_eq!(
            task.await.expect("join"),
            DisconnectReason::Framing(FramingError::MalformedLength {
                declared: 0x40,
                max: 8,
            })
        );
    }

    #[rstest]
    #[tokio::test]
    async fn frames_before_a_fatal_error_are_still_acknowledged(
        pipe: (DuplexStream, DuplexStream),
    ) {
        let (mut device, server) = pipe;
        let session = SessionConfig::default()
            .framer(FramerConfig::default().max_body_length(8))
            .malformed_length_policy(RecoveryPolicy::Disconnect);
        let (ctx, rx) = context(ServerConfig::default().session(session));
        let good = frame(&[0x35, 0x07]);
        let mut input = good.clone();
        input.extend_from_slice(&[0x01, 0x40, 0x00]);

        let task = tokio::spawn(process_stream(server, ctx));
        device.write_all(&input).await.expect("write");
        let mut ack = [0; 3];
        device.read_exact(&mut ack).await.expect("ack of the good frame");

        assert_eq!(ack, [0x02, good[good.len() - 2], good[good.len() - 1]]);
        assert!(matches!(
            task.await.expect("join"),
            DisconnectReason::Framing(FramingError::MalformedLength { .. })
        ));
        let events = drain(rx).await;
        assert!(matches!(events[1], IngestEvent::Record { .. }));
        assert!(matches!(
            events.last(),
            Some(IngestEvent::Disconnected {
                reason: DisconnectReason::Framing(_),
                ..
            })
        ));
    }

    #[test]
    fn panic_payloads_are_rendered() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert!(panic_message(&5_u32).contains("Any"));
    }
}
