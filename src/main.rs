use std::sync::Arc;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};

use crabgate::config::Config;
use crabgate::control::{
    self, ControlLink, ControlMessage, HandlerError, MessageKind, ReliableSender,
};
use crabgate::metrics::{NoopMetrics, SharedMetrics};
use crabgate::relay;

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const APP_NAME: &str = "🦀 crabgate";

/// The control channel is required infrastructure; losing it exits loudly.
const CONTROL_CHANNEL_EXIT_CODE: i32 = 100;

// -----------------------------------------------------------------------------
// ----- Main ------------------------------------------------------------------

#[tokio::main]
async fn main() -> std::io::Result<()> {
    setup().await;
    run_forever().await
}

// -----------------------------------------------------------------------------
// ----- Setup -----------------------------------------------------------------

async fn setup() {
    // This has to be the first thing we do, because it initializes the config
    Config::init().await;

    init_tracing();
}

fn init_tracing() {
    let config = Config::snapshot();
    let filter = EnvFilter::try_new(config.log_level.as_str()).unwrap();
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

// -----------------------------------------------------------------------------
// ----- Run -------------------------------------------------------------------

async fn run_forever() -> std::io::Result<()> {
    let config = Config::snapshot();

    let socket = if config.listen_addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };

    socket.bind(config.listen_addr)?;

    let listener: TcpListener = socket.listen(1024)?;

    let metrics: SharedMetrics = Arc::new(NoopMetrics);
    let shutdown = CancellationToken::new();

    let control_stream = TcpStream::connect(config.control_addr).await?;
    control_stream.set_nodelay(true)?;
    let (control_source, control_sink) = control_stream.into_split();

    let link = ControlLink::new(control_sink);
    let sender = ReliableSender::new(link.clone(), config.backoff.clone(), metrics.clone());

    let handler = control_handler(shutdown.clone());
    let mut dispatcher = tokio::spawn(control::dispatch(
        control_source,
        link,
        handler,
        metrics.clone(),
    ));

    info!(
        "{} listening on {}, control channel at {}",
        APP_NAME, config.listen_addr, config.control_addr
    );

    let mut notify_service = false;

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("{} shutting down", APP_NAME);
                notify_service = true;
                break;
            }

            _ = shutdown.cancelled() => {
                info!("{} shutting down at the migration service's request", APP_NAME);
                break;
            }

            end = &mut dispatcher => {
                match end {
                    Ok(Err(e)) => error!("control channel lost: {e}"),
                    Ok(Ok(())) => error!("control channel dispatcher stopped"),
                    Err(e) => error!("control channel dispatcher panicked: {e}"),
                }
                shutdown.cancel();
                sender.shutdown().await;
                std::process::exit(CONTROL_CHANNEL_EXIT_CODE);
            }

            accept_res = listener.accept() => {
                let (stream, peer) = match accept_res {
                    Ok(v) => v,
                    Err(e) => { error!("accept error: {e}"); continue; }
                };

                let _ = stream.set_nodelay(true);

                let session_cancel = shutdown.child_token();
                let session_metrics = metrics.clone();
                let backend_addr = config.backend_addr;
                let queue_depth = config.queue_depth;

                tokio::spawn(async move {
                    let session = relay::run_session(
                        stream,
                        peer,
                        backend_addr,
                        queue_depth,
                        session_cancel,
                        session_metrics,
                    );

                    if let Err(e) = session.await {
                        error!("client {peer} session error: {e}");
                    }
                });
            }
        }
    }

    if notify_service {
        let notice = ControlMessage::new(MessageKind::Shutdown, Vec::new());
        if let Err(e) = sender.send(notice) {
            error!("failed to queue shutdown notice: {e}");
        }
    }

    shutdown.cancel();
    dispatcher.abort();
    sender.shutdown().await;

    Ok(())
}

// -----------------------------------------------------------------------------
// ----- Control handler -------------------------------------------------------

/// The proxy-side reaction to migration-service messages. Orchestration
/// proper lives outside this binary; here a shutdown request tears the proxy
/// down and everything else is acknowledged and logged.
fn control_handler(
    shutdown: CancellationToken,
) -> impl FnMut(&ControlMessage) -> Result<(), HandlerError> {
    move |message: &ControlMessage| {
        match message.kind {
            MessageKind::Shutdown => {
                info!(id = %message.id, "migration service requested shutdown");
                shutdown.cancel();
            }
            MessageKind::Success | MessageKind::Failure => {
                // Correlation bookkeeping belongs to the orchestration layer.
                info!(id = %message.id, kind = ?message.kind, "acknowledgment received");
            }
            kind => {
                info!(
                    id = %message.id,
                    ?kind,
                    payload_len = message.payload.len(),
                    "migration update received"
                );
            }
        }

        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
