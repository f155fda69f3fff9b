use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;

use crate::metrics::SharedMetrics;

use super::backend::BackendForwarder;
use super::client::ClientRelay;

// -----------------------------------------------------------------------------
// ----- run_session -----------------------------------------------------------

/// Wire one accepted client connection to its own backend connection and run
/// the session until both sides have torn down. Fails only if the backend is
/// unreachable; everything after that is handled inside the loops.
pub async fn run_session(
    client: TcpStream,
    peer: SocketAddr,
    backend_addr: SocketAddr,
    queue_depth: usize,
    cancel: CancellationToken,
    metrics: SharedMetrics,
) -> std::io::Result<()> {
    let (relay, queues) = ClientRelay::new(client, peer, queue_depth, cancel.clone(), metrics.clone());
    let forwarder = BackendForwarder::connect(backend_addr, queues, cancel, metrics).await?;

    tokio::join!(relay.run(), forwarder.run());

    Ok(())
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
