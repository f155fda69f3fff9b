use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use serde::Deserialize;
use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};
use thiserror::Error;
use tokio::fs;

use crate::control::BackoffPolicy;

use super::{cli::CliConfig, types::LogLevel};

// -----------------------------------------------------------------------------
// ----- Constants -------------------------------------------------------------

const DEFAULT_QUEUE_DEPTH: usize = 32;

// -----------------------------------------------------------------------------
// ----- Global Singleton ------------------------------------------------------

static ROOT_CONFIG: OnceCell<Arc<RwLock<Config>>> = OnceCell::new();

// -----------------------------------------------------------------------------
// ----- Config ----------------------------------------------------------------

#[derive(Clone, Debug)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub backend_addr: SocketAddr,
    pub control_addr: SocketAddr,
    pub log_level: LogLevel,
    pub queue_depth: usize,
    pub backoff: BackoffPolicy,
}

// -----------------------------------------------------------------------------
// ----- Config: Static --------------------------------------------------------

impl Config {
    /// Init: panic on any error. Do not continue with a bad state.
    pub async fn init() {
        CliConfig::init();
        Self::load().await;
    }

    pub fn snapshot() -> Config {
        Self::handle().read().clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Config: Private -------------------------------------------------------

impl Config {
    async fn load() {
        let cli = CliConfig::snapshot();

        let file = match cli.config_file_location.as_deref() {
            Some(path) => FileConfig::from_file_async(path)
                .await
                .unwrap_or_else(|e| panic!("failed to load config from {path:?}: {e}")),
            None => FileConfig::default(),
        };

        let next = Config {
            listen_addr: cli.listen_addr,
            backend_addr: cli.backend_addr,
            control_addr: cli.control_addr,
            log_level: cli.log_level,
            queue_depth: file.queue_depth.unwrap_or(DEFAULT_QUEUE_DEPTH),
            backoff: file.backoff_policy(),
        };

        if let Some(handle) = ROOT_CONFIG.get() {
            *handle.write() = next;
        } else {
            let _ = ROOT_CONFIG.set(Arc::new(RwLock::new(next)));
        }
    }

    fn handle() -> Arc<RwLock<Config>> {
        ROOT_CONFIG
            .get()
            .expect("Config not initialized; call Config::init().await first")
            .clone()
    }
}

// -----------------------------------------------------------------------------
// ----- Internal: On-disk format ----------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    queue_depth: Option<usize>,

    #[serde(default)]
    backoff: Option<BackoffFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct BackoffFile {
    #[serde(default)]
    min_ms: Option<u64>,

    #[serde(default)]
    max_ms: Option<u64>,

    #[serde(default)]
    factor: Option<u32>,
}

impl FileConfig {
    async fn from_file_async(path: &Path) -> Result<FileConfig, ConfigError> {
        let raw = fs::read_to_string(path).await.map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Result<FileConfig, ConfigError> {
        toml::from_str(raw).map_err(|e| ConfigError::Toml { source: e })
    }

    fn backoff_policy(&self) -> BackoffPolicy {
        let defaults = BackoffPolicy::default();
        let Some(file) = self.backoff.as_ref() else {
            return defaults;
        };

        BackoffPolicy {
            min: file.min_ms.map(Duration::from_millis).unwrap_or(defaults.min),
            max: file.max_ms.map(Duration::from_millis).unwrap_or(defaults.max),
            factor: file.factor.unwrap_or(defaults.factor),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read error for {path:?}: {source}")]
    Io {
        path: std::path::PathBuf,
        source: std::io::Error,
    },

    #[error("toml parse error: {source}")]
    Toml { source: toml::de::Error },
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
