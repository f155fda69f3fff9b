pub mod cli;
pub mod config;
pub mod types;

pub use config::{Config, ConfigError};
pub use types::LogLevel;
