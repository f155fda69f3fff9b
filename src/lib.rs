pub mod config;
pub mod control;
pub mod metrics;
pub mod relay;
pub mod wire;

pub use config::Config;
pub use control::{ControlLink, ControlMessage, MessageKind, ReliableSender};
pub use relay::ClientRelay;
pub use wire::Frame;
