use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::metrics::SharedMetrics;
use crate::wire::{read_frame, Direction, Frame, FrameError};

use super::client::SessionQueues;

// -----------------------------------------------------------------------------
// ----- BackendForwarder ------------------------------------------------------

/// The backend half of a relay session: drains the session's request queue
/// into the backend connection and feeds backend frames back onto the
/// response queue, byte for byte. Mirrors `ClientRelay` with the directions
/// reversed, under the same cancellation token.
pub struct BackendForwarder {
    addr: SocketAddr,
    reader: tokio::net::tcp::OwnedReadHalf,
    writer: tokio::net::tcp::OwnedWriteHalf,
    requests: mpsc::Receiver<Frame>,
    responses: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    metrics: SharedMetrics,
}

// -----------------------------------------------------------------------------
// ----- BackendForwarder: Static ----------------------------------------------

impl BackendForwarder {
    pub async fn connect(
        addr: SocketAddr,
        queues: SessionQueues,
        cancel: CancellationToken,
        metrics: SharedMetrics,
    ) -> std::io::Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (reader, writer) = stream.into_split();

        Ok(Self {
            addr,
            reader,
            writer,
            requests: queues.requests,
            responses: queues.responses,
            cancel,
            metrics,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- BackendForwarder: Public ----------------------------------------------

impl BackendForwarder {
    pub async fn run(self) {
        let Self {
            addr,
            reader,
            writer,
            requests,
            responses,
            cancel,
            metrics,
        } = self;

        tokio::join!(
            push_requests(writer, requests, cancel.clone(), addr),
            pull_responses(reader, responses, cancel, metrics, addr),
        );
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: request drain -----------------------------------------------

async fn push_requests<W>(
    mut writer: W,
    mut requests: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
    addr: SocketAddr,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let frame = tokio::select! {
            biased;

            _ = cancel.cancelled() => break,
            received = requests.recv() => match received {
                Some(frame) => frame,
                None => {
                    debug!(backend = %addr, "request queue finalized");
                    break;
                }
            },
        };

        if let Err(error) = writer.write_all(frame.as_bytes()).await {
            error!(backend = %addr, %error, "backend write failed");
            cancel.cancel();
            break;
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: response feed -----------------------------------------------

async fn pull_responses<R>(
    mut reader: R,
    responses: mpsc::Sender<Bytes>,
    cancel: CancellationToken,
    metrics: SharedMetrics,
    addr: SocketAddr,
) where
    R: AsyncRead + Unpin,
{
    loop {
        match read_frame(&mut reader, &cancel).await {
            Ok(frame) => {
                if frame.direction != Direction::Response {
                    warn!(backend = %addr, direction = ?frame.direction, "frame not backend-originated, discarding");
                    metrics.frame_discarded();
                    continue;
                }

                if responses.send(frame.into_bytes()).await.is_err() {
                    debug!(backend = %addr, "response consumer gone, ending session");
                    cancel.cancel();
                    break;
                }
            }
            Err(FrameError::Cancelled) => break,
            Err(FrameError::EndOfStream) => {
                info!(backend = %addr, "backend disconnected");
                cancel.cancel();
                break;
            }
            Err(error) => {
                error!(backend = %addr, %error, "backend read failed");
                cancel.cancel();
                break;
            }
        }
    }
    // `responses` drops here, which unblocks the client's response loop.
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
