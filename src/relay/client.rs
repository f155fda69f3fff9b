use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::SharedMetrics;
use crate::wire::{read_frame, Direction, Frame, FrameError};

// -----------------------------------------------------------------------------
// ----- SessionQueues ---------------------------------------------------------

/// The external collaborator's half of a relay session: client frames arrive
/// on `requests` in wire order; whatever is pushed onto `responses` is
/// written back to the client verbatim. `requests` yields `None` once the
/// client is gone or the session is cancelled.
pub struct SessionQueues {
    pub requests: mpsc::Receiver<Frame>,
    pub responses: mpsc::Sender<Bytes>,
}

// -----------------------------------------------------------------------------
// ----- ClientRelay -----------------------------------------------------------

/// Owns one client connection for its whole lifetime and runs the two halves
/// of the session: a request loop feeding the request queue and a response
/// loop draining the response queue. Both observe the same cancellation
/// token; whichever loop hits a terminal condition cancels the other.
pub struct ClientRelay {
    peer: SocketAddr,
    reader: tokio::net::tcp::OwnedReadHalf,
    writer: tokio::net::tcp::OwnedWriteHalf,
    requests: mpsc::Sender<Frame>,
    responses: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
    metrics: SharedMetrics,
}

// -----------------------------------------------------------------------------
// ----- ClientRelay: Static ---------------------------------------------------

impl ClientRelay {
    pub fn new(
        stream: TcpStream,
        peer: SocketAddr,
        queue_depth: usize,
        cancel: CancellationToken,
        metrics: SharedMetrics,
    ) -> (Self, SessionQueues) {
        let (reader, writer) = stream.into_split();
        let (request_tx, request_rx) = mpsc::channel(queue_depth);
        let (response_tx, response_rx) = mpsc::channel(queue_depth);

        let relay = Self {
            peer,
            reader,
            writer,
            requests: request_tx,
            responses: response_rx,
            cancel,
            metrics,
        };

        let queues = SessionQueues {
            requests: request_rx,
            responses: response_tx,
        };

        (relay, queues)
    }
}

// -----------------------------------------------------------------------------
// ----- ClientRelay: Public ---------------------------------------------------

impl ClientRelay {
    /// Run both session loops to completion. Returns once the session is
    /// fully torn down; dropping the two halves here closes the connection
    /// exactly once, no matter which loop failed first.
    pub async fn run(self) {
        let Self {
            peer,
            reader,
            writer,
            requests,
            responses,
            cancel,
            metrics,
        } = self;

        tokio::join!(
            forward_requests(reader, requests, cancel.clone(), metrics.clone(), peer),
            forward_responses(writer, responses, cancel, metrics, peer),
        );
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: request loop ------------------------------------------------

async fn forward_requests<R>(
    mut reader: R,
    requests: mpsc::Sender<Frame>,
    cancel: CancellationToken,
    metrics: SharedMetrics,
    peer: SocketAddr,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader, &cancel).await {
            Ok(frame) => {
                if frame.direction != Direction::Request {
                    warn!(%peer, direction = ?frame.direction, "frame not client-originated, discarding");
                    metrics.frame_discarded();
                    continue;
                }

                // Blocks while the queue is full: backpressure to the client.
                if requests.send(frame).await.is_err() {
                    debug!(%peer, "request consumer gone, ending session");
                    cancel.cancel();
                    break;
                }
                metrics.request_forwarded();
            }
            Err(FrameError::Cancelled) => break,
            Err(FrameError::EndOfStream) => {
                info!(%peer, "client disconnected");
                cancel.cancel();
                break;
            }
            Err(error) => {
                error!(%peer, %error, "client read failed");
                cancel.cancel();
                break;
            }
        }
    }
    // `requests` drops here, finalizing the queue exactly once on every path.
}

// -----------------------------------------------------------------------------
// ----- Internal: response loop -----------------------------------------------

async fn forward_responses<W>(
    mut writer: W,
    mut responses: mpsc::Receiver<Bytes>,
    cancel: CancellationToken,
    metrics: SharedMetrics,
    peer: SocketAddr,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let response = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            received = responses.recv() => match received {
                Some(response) => response,
                None => {
                    debug!(%peer, "response queue finalized");
                    break;
                }
            },
        };

        if let Err(error) = writer.write_all(&response).await {
            error!(%peer, %error, "response write failed");
            cancel.cancel();
            break;
        }
        metrics.response_written(response.len());
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::NoopMetrics;
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    fn raw_frame(version: u8, body: &[u8]) -> Vec<u8> {
        let mut raw = vec![version, 0, 0, 1, 0x09];
        raw.extend_from_slice(&(body.len() as u32).to_be_bytes());
        raw.extend_from_slice(body);
        raw
    }

    fn peer() -> SocketAddr {
        "127.0.0.1:9042".parse().unwrap()
    }

    #[tokio::test]
    async fn only_client_originated_frames_reach_the_queue() {
        let (mut client, server) = tokio::io::duplex(1024);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();

        client.write_all(&raw_frame(0x00, b"one")).await.unwrap();
        client.write_all(&raw_frame(0x80, b"backend")).await.unwrap();
        client.write_all(&raw_frame(0x00, b"two")).await.unwrap();
        drop(client);

        forward_requests(server, tx, cancel.clone(), Arc::new(NoopMetrics), peer()).await;

        assert_eq!(rx.recv().await.unwrap().body(), b"one");
        assert_eq!(rx.recv().await.unwrap().body(), b"two");
        assert!(rx.recv().await.is_none());
        assert!(rx.recv().await.is_none()); // finalization is idempotent
        assert!(cancel.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_request_loop_reads_nothing_further() {
        let (mut client, server) = tokio::io::duplex(1024);
        let (tx, mut rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        client.write_all(&raw_frame(0x00, b"late")).await.unwrap();

        forward_requests(server, tx, cancel, Arc::new(NoopMetrics), peer()).await;

        // The loop stopped at the cancellation check, before the frame.
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn responses_are_written_verbatim() {
        let (writer, mut client) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::channel::<Bytes>(8);
        let cancel = CancellationToken::new();

        let loop_task = tokio::spawn(forward_responses(
            writer,
            rx,
            cancel,
            Arc::new(NoopMetrics),
            peer(),
        ));

        tx.send(Bytes::from_static(&[0x00, 0x00, 0x00, 0x00, 0x08]))
            .await
            .unwrap();

        let mut written = [0u8; 5];
        client.read_exact(&mut written).await.unwrap();
        assert_eq!(written, [0x00, 0x00, 0x00, 0x00, 0x08]);

        // Finalizing the queue ends the loop cleanly.
        drop(tx);
        loop_task.await.unwrap();
    }

    #[tokio::test]
    async fn response_loop_stops_on_cancellation() {
        let (writer, _client) = tokio::io::duplex(1024);
        let (tx, rx) = mpsc::channel::<Bytes>(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        forward_responses(writer, rx, cancel, Arc::new(NoopMetrics), peer()).await;

        // The loop dropped its receiver without draining anything.
        assert!(tx.is_closed());
    }

    #[tokio::test]
    async fn write_failure_cancels_the_session() {
        let (writer, client) = tokio::io::duplex(8);
        let (tx, rx) = mpsc::channel::<Bytes>(8);
        let cancel = CancellationToken::new();

        drop(client); // every subsequent write fails

        let loop_task = tokio::spawn(forward_responses(
            writer,
            rx,
            cancel.clone(),
            Arc::new(NoopMetrics),
            peer(),
        ));

        tx.send(Bytes::from_static(b"undeliverable")).await.unwrap();

        loop_task.await.unwrap();
        assert!(cancel.is_cancelled());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
