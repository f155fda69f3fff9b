//! The private coordination channel between the proxy and the migration
//! service: message model, length-prefixed codec, retried delivery, and the
//! inbound dispatch loop.

pub mod codec;
pub mod dispatcher;
pub mod link;
pub mod message;
pub mod sender;

pub use codec::CodecError;
pub use dispatcher::{dispatch, DispatchError, HandlerError};
pub use link::ControlLink;
pub use message::{ControlMessage, MessageKind};
pub use sender::{BackoffPolicy, ReliableSender};
