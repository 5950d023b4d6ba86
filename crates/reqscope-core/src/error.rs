//! Error types shared across reqscope crates

use std::path::PathBuf;
use thiserror::Error;

/// A message whose payload does not have the shape its type tag promises
#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("message {message_id} ({message_type}) is missing field `{field}`")]
    MissingField {
        message_id: String,
        message_type: String,
        field: &'static str,
    },

    #[error("message {message_id} ({message_type}) has an invalid payload: {source}")]
    Invalid {
        message_id: String,
        message_type: String,
        #[source]
        source: serde_json::Error,
    },
}

impl PayloadError {
    /// Id of the offending message
    pub fn message_id(&self) -> &str {
        match self {
            PayloadError::MissingField { message_id, .. } => message_id,
            PayloadError::Invalid { message_id, .. } => message_id,
        }
    }

    /// Type tag the payload was decoded as
    pub fn message_type(&self) -> &str {
        match self {
            PayloadError::MissingField { message_type, .. } => message_type,
            PayloadError::Invalid { message_type, .. } => message_type,
        }
    }
}

/// Errors raised while loading captured message streams
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Failed to read capture file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse message at line {line}: {source}")]
    Parse {
        line: u64,
        #[source]
        source: serde_json::Error,
    },
}
