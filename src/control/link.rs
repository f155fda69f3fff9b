use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

// -----------------------------------------------------------------------------
// ----- ControlLink -----------------------------------------------------------

/// Shared handle to the control channel's write half. Every outbound control
/// frame — retried deliveries and acknowledgments alike — funnels through the
/// same lock, so a frame is never interleaved with another writer's bytes.
#[derive(Debug)]
pub struct ControlLink<W> {
    writer: Arc<Mutex<W>>,
}

impl<W> Clone for ControlLink<W> {
    fn clone(&self) -> Self {
        Self {
            writer: Arc::clone(&self.writer),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ControlLink: Public ---------------------------------------------------

impl<W> ControlLink<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(writer)),
        }
    }

    /// Write one complete control frame. A short write surfaces as an error,
    /// never as partial delivery.
    pub async fn write_frame(&self, frame: &[u8]) -> std::io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(frame).await?;
        writer.flush().await
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
