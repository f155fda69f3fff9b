use clap::Parser;
use parking_lot::RwLock;
use std::{
    fs,
    net::{IpAddr, SocketAddr},
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use super::types::LogLevel;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static CLI_CONFIG: OnceLock<Arc<RwLock<CliConfig>>> = OnceLock::new();

// -----------------------------------------------------------------------------
// ----- CliConfig -------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct CliConfig {
    pub listen_addr: SocketAddr,
    pub backend_addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub config_file_location: Option<PathBuf>,
    pub log_level: LogLevel,
}

impl CliConfig {
    pub fn init() {
        CLI_CONFIG.get_or_init(|| {
            let cfg = Self::from_args();
            cfg.validate();
            Arc::new(RwLock::new(cfg))
        });
    }

    pub fn snapshot() -> CliConfig {
        handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- CliConfig: Private ----------------------------------------------------

impl CliConfig {
    fn from_args() -> Self {
        let args = Args::try_parse().unwrap_or_else(|e| panic!("Invalid CLI/ENV: {e}"));

        Self {
            listen_addr: SocketAddr::from((args.host, args.port)),
            backend_addr: args.backend,
            control_addr: args.control,
            config_file_location: args.config_file,
            log_level: args.log_level,
        }
    }

    fn validate(&self) {
        if let Some(path) = self.config_file_location.as_deref() {
            must_exist_file(path, "--config / crabgate.toml");
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Args ------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(name = "crabgate", version, about = "Database migration proxy")]
struct Args {
    // IPv4 or IPv6 literal to accept clients on. Required via CLI or ENV.
    #[arg(long = "host", short = 'H', env = "CRABGATE_HOST")]
    host: IpAddr,

    // Required via CLI or ENV.
    #[arg(long = "port", short = 'p', env = "CRABGATE_PORT")]
    port: u16,

    // Backend database the relayed frames go to.
    #[arg(long = "backend", env = "CRABGATE_BACKEND")]
    backend: SocketAddr,

    // Migration service's control channel endpoint.
    #[arg(long = "control", env = "CRABGATE_CONTROL")]
    control: SocketAddr,

    // Not required via CLI or ENV (defaults to info).
    #[arg(long = "log", default_value = "info")]
    log_level: LogLevel,

    // Optional tuning file; must exist when given.
    #[arg(long = "config", env = "CRABGATE_CONFIG_FILE")]
    config_file: Option<PathBuf>,
}

// -----------------------------------------------------------------------------
// ----- Private Utils ---------------------------------------------------------

fn handle() -> Arc<RwLock<CliConfig>> {
    CLI_CONFIG
        .get()
        .expect("config not initialized; call config::init().await first")
        .clone()
}

fn must_exist_file(path: &Path, hint: &str) {
    let md = fs::metadata(path).unwrap_or_else(|_| {
        panic!("required file missing: {} (from {hint})", path.display());
    });

    if !md.is_file() {
        panic!("path is not a file: {} (from {hint})", path.display());
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
