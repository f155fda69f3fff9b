//! Framing for the proxied wire protocol: fixed-header parsing and the
//! cancellation-aware frame reader.

pub mod frame;
pub mod reader;

pub use frame::{Direction, Frame, FrameHeader, HEADER_LEN};
pub use reader::{read_frame, FrameError, MAX_BODY_LEN};
