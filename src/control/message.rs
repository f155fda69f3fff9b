use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

// -----------------------------------------------------------------------------
// ----- MessageKind -----------------------------------------------------------

/// Coordination message types exchanged between the proxy and the migration
/// service. `Success` and `Failure` are acknowledgments; everything else
/// expects exactly one acknowledgment back, correlated by message id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum MessageKind {
    TableUpdated,
    TableRestart,
    Start,
    Complete,
    Shutdown,
    Success,
    Failure,
}

impl From<MessageKind> for u8 {
    fn from(kind: MessageKind) -> u8 {
        match kind {
            MessageKind::TableUpdated => 0,
            MessageKind::TableRestart => 1,
            MessageKind::Start => 2,
            MessageKind::Complete => 3,
            MessageKind::Shutdown => 4,
            MessageKind::Success => 5,
            MessageKind::Failure => 6,
        }
    }
}

impl TryFrom<u8> for MessageKind {
    type Error = UnknownKind;

    fn try_from(value: u8) -> Result<Self, UnknownKind> {
        match value {
            0 => Ok(MessageKind::TableUpdated),
            1 => Ok(MessageKind::TableRestart),
            2 => Ok(MessageKind::Start),
            3 => Ok(MessageKind::Complete),
            4 => Ok(MessageKind::Shutdown),
            5 => Ok(MessageKind::Success),
            6 => Ok(MessageKind::Failure),
            other => Err(UnknownKind(other)),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown control message kind {0}")]
pub struct UnknownKind(pub u8);

// -----------------------------------------------------------------------------
// ----- ControlMessage --------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlMessage {
    pub id: String,
    pub kind: MessageKind,
    pub payload: Vec<u8>,
    pub error: String,
}

// -----------------------------------------------------------------------------
// ----- ControlMessage: Static ------------------------------------------------

impl ControlMessage {
    pub fn new(kind: MessageKind, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            kind,
            payload: payload.into(),
            error: String::new(),
        }
    }
}

// -----------------------------------------------------------------------------
// ----- ControlMessage: Public ------------------------------------------------

impl ControlMessage {
    /// Acknowledgment for a processed message, carrying the same id.
    pub fn success_ack(&self) -> ControlMessage {
        ControlMessage {
            id: self.id.clone(),
            kind: MessageKind::Success,
            payload: Vec::new(),
            error: String::new(),
        }
    }

    /// Failure acknowledgment carrying the same id and the handler's error.
    pub fn failure_ack(&self, error: impl Into<String>) -> ControlMessage {
        ControlMessage {
            id: self.id.clone(),
            kind: MessageKind::Failure,
            payload: Vec::new(),
            error: error.into(),
        }
    }

    pub fn is_ack(&self) -> bool {
        matches!(self.kind, MessageKind::Success | MessageKind::Failure)
    }
}

// -----------------------------------------------------------------------------
// ----- Tests -----------------------------------------------------------------


// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
