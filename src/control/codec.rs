use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use super::message::ControlMessage;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

/// Control frames are `[u32 big-endian body length][encoded body]`.
pub const LENGTH_PREFIX_LEN: usize = 4;

// -----------------------------------------------------------------------------
// ----- CodecError ------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("control message encoding failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("control message decoding failed: {0}")]
    Decode(#[source] serde_json::Error),
}

// -----------------------------------------------------------------------------
// ----- encode / decode -------------------------------------------------------

/// Serialize a message into a complete, length-prefixed wire frame.
pub fn encode(message: &ControlMessage) -> Result<Bytes, CodecError> {
    let body = serde_json::to_vec(message).map_err(CodecError::Encode)?;

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + body.len());
    frame.put_u32(body.len() as u32);
    frame.extend_from_slice(&body);

    Ok(frame.freeze())
}

/// Decode a frame body (the bytes after the length prefix).
pub fn decode(body: &[u8]) -> Result<ControlMessage, CodecError> {
    serde_json::from_slice(body).map_err(CodecError::Decode)
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
