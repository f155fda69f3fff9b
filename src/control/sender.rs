use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncWrite;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

use crate::metrics::SharedMetrics;

use super::codec::{self, CodecError};
use super::link::ControlLink;
use super::message::ControlMessage;

// -----------------------------------------------------------------------------
// ----- BackoffPolicy ---------------------------------------------------------

/// Multiplicative retry schedule: the delay before attempt `k + 1` is
/// `min(max, min * factor^k)`. The first attempt runs with no delay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    pub min: Duration,
    pub max: Duration,
    pub factor: u32,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            min: Duration::from_millis(200),
            max: Duration::from_secs(10),
            factor: 2,
        }
    }
}

impl BackoffPolicy {
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = self.min.saturating_mul(self.factor.saturating_pow(attempt));
        scaled.min(self.max)
    }
}

// -----------------------------------------------------------------------------
// ----- ReliableSender --------------------------------------------------------

/// Delivers control messages to the migration service without blocking the
/// caller: each send is serialized once, then handed to a tracked background
/// task that retries forever with exponential backoff. Dropping a
/// coordination message is worse than late delivery on this channel, so the
/// only way a delivery stops retrying is success or process teardown.
pub struct ReliableSender<W> {
    link: ControlLink<W>,
    policy: BackoffPolicy,
    metrics: SharedMetrics,
    tasks: TaskTracker,
    shutdown: CancellationToken,
}

// -----------------------------------------------------------------------------
// ----- ReliableSender: Static ------------------------------------------------

impl<W> ReliableSender<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(link: ControlLink<W>, policy: BackoffPolicy, metrics: SharedMetrics) -> Self {
        Self {
            link,
            policy,
            metrics,
            tasks: TaskTracker::new(),
            shutdown: CancellationToken::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ReliableSender: Public ------------------------------------------------

impl<W> ReliableSender<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// Queue a message for delivery. Returns once the delivery task is
    /// spawned; the caller never waits on the wire.
    pub fn send(&self, message: ControlMessage) -> Result<(), CodecError> {
        let frame = codec::encode(&message)?;

        let link = self.link.clone();
        let policy = self.policy.clone();
        let metrics = self.metrics.clone();
        let shutdown = self.shutdown.clone();

        self.tasks
            .spawn(deliver(link, frame, message, policy, metrics, shutdown));

        Ok(())
    }

    /// Stop retrying and wait for in-flight delivery tasks to finish. Each
    /// task completes its current write attempt; pending backoff waits are
    /// abandoned.
    pub async fn shutdown(self) {
        self.shutdown.cancel();
        self.tasks.close();
        self.tasks.wait().await;
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: delivery loop -----------------------------------------------

async fn deliver<W>(
    link: ControlLink<W>,
    frame: Bytes,
    message: ControlMessage,
    policy: BackoffPolicy,
    metrics: SharedMetrics,
    shutdown: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    let mut attempt = 0u32;

    loop {
        match link.write_frame(&frame).await {
            Ok(()) => {
                debug!(id = %message.id, kind = ?message.kind, "control message delivered");
                return;
            }
            Err(error) => {
                if shutdown.is_cancelled() {
                    warn!(id = %message.id, "delivery abandoned at shutdown");
                    return;
                }

                let delay = policy.delay(attempt);
                attempt = attempt.saturating_add(1);
                metrics.delivery_retried();
                warn!(
                    id = %message.id,
                    %error,
                    "control message delivery failed, retrying in {delay:?}"
                );

                tokio::select! {
                    biased;

                    _ = shutdown.cancelled() => {
                        warn!(id = %message.id, "delivery abandoned at shutdown");
                        return;
                    }
                    _ = sleep(delay) => {}
                }
            }
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
