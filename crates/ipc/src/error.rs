//! Errors raised while encoding or decoding canvas messages.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IpcError {
    /// Payload is not valid JSON for the expected message type
    #[error("Malformed canvas message: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Empty canvas message")]
    Empty,
}
