// MIT License - Copyright (c) 2026 Peter Wright
// Texecom virtual keypad bridge

use crate::task::Task;

/// All errors that can be returned at the gateway's call boundary.
///
/// Everything that goes wrong inside a tick (framing anomalies, unexpected panel
/// replies, timeouts) is recovered locally and only logged; these variants cover
/// rejected requests and host-side I/O.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request rejected: {active:?} task already in progress")]
    Busy { active: Task },

    #[error("Invalid user code: {reason}")]
    InvalidCode { reason: &'static str },

    #[error("Invalid UDL code: must be exactly 6 characters")]
    InvalidUdlCode,

    #[error("Invalid zone count {count}: must be 1 to {max}")]
    InvalidZoneCount { count: u8, max: u8 },

    #[error("Transport channel closed")]
    ChannelClosed,

    #[error("Settings error: {0}")]
    Settings(#[from] serde_json::Error),
}

impl BridgeError {
    /// Whether the caller may simply retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Busy { .. } | BridgeError::Io(_))
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
