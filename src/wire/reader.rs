use bytes::BytesMut;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio_util::sync::CancellationToken;

use super::frame::{Frame, FrameHeader, HEADER_LEN};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Largest body a single frame may declare. Anything above this is treated as
/// a corrupt stream rather than allocated.
pub const MAX_BODY_LEN: u32 = 256 * 1024 * 1024;

// -----------------------------------------------------------------------------
// ----- FrameError ------------------------------------------------------------

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("read cancelled by session shutdown")]
    Cancelled,

    #[error("connection closed by peer")]
    EndOfStream,

    #[error("declared body of {0} bytes exceeds the {MAX_BODY_LEN}-byte frame limit")]
    OversizedBody(u32),

    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),
}

// -----------------------------------------------------------------------------
// ----- read_frame ------------------------------------------------------------

/// Read one complete frame from `reader`.
///
/// The cancellation token is observed while waiting for the header; once the
/// first header byte has arrived the frame is read to completion. Either a
/// whole frame comes back or an error does — callers never see partial input.
///
/// A peer that closes the connection between frames yields `EndOfStream`; a
/// connection that dies mid-frame yields `Io`.
pub async fn read_frame<R>(reader: &mut R, cancel: &CancellationToken) -> Result<Frame, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];

    let first = tokio::select! {
        biased;

        _ = cancel.cancelled() => return Err(FrameError::Cancelled),
        read = reader.read(&mut header) => read?,
    };

    if first == 0 {
        return Err(FrameError::EndOfStream);
    }
    if first < HEADER_LEN {
        reader.read_exact(&mut header[first..]).await?;
    }

    let parsed = FrameHeader::decode(&header);
    if parsed.body_len > MAX_BODY_LEN {
        return Err(FrameError::OversizedBody(parsed.body_len));
    }

    let total = HEADER_LEN + parsed.body_len as usize;
    let mut bytes = BytesMut::with_capacity(total);
    bytes.extend_from_slice(&header);
    bytes.resize(total, 0);
    reader.read_exact(&mut bytes[HEADER_LEN..]).await?;

    Ok(Frame::new(parsed, bytes.freeze()))
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
