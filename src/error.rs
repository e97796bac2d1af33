//! Error types for store access and submission handling.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

/// A field-level error reported by the remote store on write.
///
/// Kept exactly as the store sent it so it can be echoed back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldError(Map<String, Value>);

impl FieldError {
    /// Build an error with the usual `field`, `message`, and `code` keys.
    /// Absent parts are left out of the object.
    pub fn new(field: Option<&[&str]>, message: impl Into<String>, code: Option<&str>) -> Self {
        let mut entries = Map::new();
        if let Some(path) = field {
            entries.insert("field".to_string(), json!(path));
        }
        entries.insert("message".to_string(), Value::String(message.into()));
        if let Some(code) = code {
            entries.insert("code".to_string(), Value::String(code.to_string()));
        }
        Self(entries)
    }

    /// Human-readable message, empty when the store sent none.
    pub fn message(&self) -> &str {
        self.0.get("message").and_then(Value::as_str).unwrap_or_default()
    }

    /// Path to the offending input field, if the store reported one.
    pub fn field(&self) -> Option<Vec<&str>> {
        self.0
            .get("field")?
            .as_array()
            .map(|path| path.iter().filter_map(Value::as_str).collect())
    }

    /// Machine-readable error code, if any.
    pub fn code(&self) -> Option<&str> {
        self.0.get("code").and_then(Value::as_str)
    }
}

/// Failure talking to the remote field store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("cannot connect to store at {0}")]
    Connect(String),

    #[error("store request timed out after {0}s")]
    Timeout(u64),

    #[error("store returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store reported errors: {0}")]
    Remote(String),

    #[error("failed to decode store response: {0}")]
    Decode(String),

    #[error("store transport error: {0}")]
    Transport(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Failure handling one submission.
#[derive(Debug, Error)]
pub enum SubmissionError {
    /// Missing or unusable input. Nothing was read or written.
    #[error("{0}")]
    Validation(String),

    /// Current state could not be read, so no write was attempted.
    #[error("failed to read current state: {0}")]
    RemoteRead(#[source] StoreError),

    /// The write request itself failed; it is unknown whether it landed.
    #[error("failed to write updated state: {0}")]
    RemoteWrite(#[source] StoreError),

    /// The store refused the write with field-level errors.
    #[error("store rejected the update ({} error(s))", .0.len())]
    WriteRejected(Vec<FieldError>),

    /// The store returned nothing for the write.
    #[error("store did not acknowledge the write")]
    WriteUnacknowledged,

    #[error("unexpected error: {0}")]
    Unexpected(String),
}

impl SubmissionError {
    /// Map this error to an HTTP-style status code.
    pub fn status_code(&self) -> u16 {
        match self {
            SubmissionError::Validation(_) | SubmissionError::WriteRejected(_) => 400,
            SubmissionError::RemoteRead(_)
            | SubmissionError::RemoteWrite(_)
            | SubmissionError::WriteUnacknowledged
            | SubmissionError::Unexpected(_) => 500,
        }
    }

    /// Shorthand for a validation failure.
    pub fn validation(message: impl Into<String>) -> Self {
        SubmissionError::Validation(message.into())
    }
}

impl From<serde_json::Error> for SubmissionError {
    fn from(err: serde_json::Error) -> Self {
        SubmissionError::Unexpected(format!("failed to encode record: {}", err))
    }
}
