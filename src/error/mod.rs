//! Error types for Colloquy.

use thiserror::Error;

/// Primary error type for all Colloquy operations.
#[derive(Error, Debug)]
pub enum ColloquyError {
    /// Removal was requested against an event name with no registered
    /// listeners in the target table.
    #[error("No listeners registered for event \"{0}\"")]
    NoListeners(String),

    #[error("{event_type}: item \"{item_id}\" not found")]
    ItemNotFound {
        event_type: &'static str,
        item_id: String,
    },

    #[error("{event_type}: response \"{response_id}\" not found")]
    ResponseNotFound {
        event_type: &'static str,
        response_id: String,
    },

    #[error("Unknown event type: \"{0}\"")]
    UnknownEventType(String),

    /// A listener failed during dispatch; the rest of the batch was
    /// aborted.
    #[error("Listener error: {0}")]
    Listener(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Authentication error: {0}")]
    Authentication(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Timeout after {0}ms")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Convenience alias.
pub type Result<T> = std::result::Result<T, ColloquyError>;
