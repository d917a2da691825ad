use crate::tokens::TokenError;
use std::time::Duration;
use thiserror::Error;

/// Result type for CamillaDSP operations
pub type Result<T> = std::result::Result<T, CamillaError>;

/// Errors that can occur when talking to a CamillaDSP engine
#[derive(Error, Debug)]
pub enum CamillaError {
    /// A command was issued without an active connection
    #[error("Not connected to CamillaDSP")]
    NotConnected,

    /// The websocket closed while a command was in flight
    #[error("Lost connection to CamillaDSP")]
    ConnectionLost,

    /// No reply arrived within the configured request timeout
    #[error("Timed out after {after:?} waiting for a reply to {command}")]
    Timeout {
        /// Command that was pending
        command: String,
        /// Configured timeout
        after: Duration,
    },

    /// A frame or value could not be tokenized as JSON
    #[error("Malformed JSON: {0}")]
    MalformedJson(#[from] TokenError),

    /// The reply did not correlate with the pending command
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// The engine reported `result: "Error"`
    #[error("CamillaDSP error: {0}")]
    Remote(String),

    /// An expected field was missing or had the wrong shape
    #[error("Failed to decode {field}: {reason}")]
    Decode {
        /// Field or command being decoded
        field: &'static str,
        /// What went wrong
        reason: String,
    },

    /// A string outside the closed vocabulary of an enum
    #[error("Invalid value for {kind}: {raw}")]
    UnknownEnumValue {
        /// Name of the enum
        kind: &'static str,
        /// Value received from the engine
        raw: String,
    },

    /// Measured rate is outside the range that can be classified
    #[error("Capture rate {0} Hz is outside the classifiable range")]
    RateOutOfRange(u32),

    /// No standard rate lies within 4% of the measured rate
    #[error("Capture rate {0} Hz doesn't match any standard rate")]
    NoStandardRateMatch(u32),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CamillaError {
    pub(crate) fn decode(field: &'static str, reason: impl Into<String>) -> Self {
        CamillaError::Decode {
            field,
            reason: reason.into(),
        }
    }
}
