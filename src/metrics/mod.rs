//! Metrics boundary. Collection and exposition live outside this crate; the
//! core only reports events through this trait, injected at construction.

use std::sync::Arc;

// -----------------------------------------------------------------------------
// ----- ProxyMetrics ----------------------------------------------------------

pub trait ProxyMetrics: Send + Sync {
    fn request_forwarded(&self) {}

    fn frame_discarded(&self) {}

    fn response_written(&self, _bytes: usize) {}

    fn control_message_received(&self) {}

    fn delivery_retried(&self) {}
}

pub type SharedMetrics = Arc<dyn ProxyMetrics>;

// -----------------------------------------------------------------------------
// ----- NoopMetrics -----------------------------------------------------------

/// Stand-in for deployments that do not wire a collector.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMetrics;

impl ProxyMetrics for NoopMetrics {}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
