use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tracing::{debug, error, warn};

use crate::metrics::SharedMetrics;

use super::codec::{self, LENGTH_PREFIX_LEN};
use super::link::ControlLink;
use super::message::ControlMessage;

// -----------------------------------------------------------------------------
// ----- HandlerError ----------------------------------------------------------

/// Failure reported by the injected message handler. The text travels back to
/// the originator inside the failure acknowledgment.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct HandlerError(pub String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

// -----------------------------------------------------------------------------
// ----- DispatchError ---------------------------------------------------------

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The control channel's source stream ended. The channel is required
    /// infrastructure, so the caller is expected to terminate the process.
    #[error("control channel closed by peer")]
    SourceClosed,
}

// -----------------------------------------------------------------------------
// ----- dispatch --------------------------------------------------------------

/// Run the control-channel read loop until the source stream ends.
///
/// Every decoded message is handed to `handler`. Non-acknowledgment messages
/// then get exactly one acknowledgment — success, or failure carrying the
/// handler's error text — written directly to `destination`. Acknowledgment
/// writes are best-effort: if one is lost, the originator's retry loop
/// re-sends the request and a fresh acknowledgment is synthesized.
pub async fn dispatch<R, W, H>(
    mut source: R,
    destination: ControlLink<W>,
    mut handler: H,
    metrics: SharedMetrics,
) -> Result<(), DispatchError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
    H: FnMut(&ControlMessage) -> Result<(), HandlerError>,
{
    let mut prefix = [0u8; LENGTH_PREFIX_LEN];

    loop {
        let read = match source.read(&mut prefix).await {
            Ok(0) => {
                error!("control channel source reached end of stream");
                return Err(DispatchError::SourceClosed);
            }
            Ok(n) => n,
            Err(error) => {
                error!(%error, "control channel read failed");
                continue;
            }
        };

        // A short read here drops the bytes already consumed without
        // resynchronizing, which can desynchronize framing for every
        // subsequent message on this connection.
        if read < LENGTH_PREFIX_LEN {
            warn!(read, "short length prefix on control channel, skipping");
            continue;
        }

        let declared = u32::from_be_bytes(prefix) as usize;
        let mut body = vec![0u8; declared];
        let read = match source.read(&mut body).await {
            Ok(n) => n,
            Err(error) => {
                error!(%error, "control channel body read failed");
                continue;
            }
        };
        if read < declared {
            warn!(read, declared, "control message body truncated, skipping");
            continue;
        }

        let message = match codec::decode(&body) {
            Ok(message) => message,
            Err(error) => {
                warn!(%error, "undecodable control message dropped");
                continue;
            }
        };

        metrics.control_message_received();
        debug!(id = %message.id, kind = ?message.kind, "control message received");

        let outcome = handler(&message);

        // Acknowledgments terminate their correlation; never ack an ack.
        if message.is_ack() {
            continue;
        }

        let ack = match outcome {
            Ok(()) => message.success_ack(),
            Err(error) => message.failure_ack(error.to_string()),
        };

        let frame = match codec::encode(&ack) {
            Ok(frame) => frame,
            Err(error) => {
                error!(id = %ack.id, %error, "failed to encode acknowledgment");
                continue;
            }
        };

        if let Err(error) = destination.write_frame(&frame).await {
            error!(id = %ack.id, %error, "failed to send acknowledgment");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
