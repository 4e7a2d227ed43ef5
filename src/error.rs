//! Error taxonomy for the polling engine.
//!
//! Every variant carries the request location (or the storage failure) so a
//! single log line at the cycle boundary is enough to diagnose a failed sync.
//!
//! | Variant | Raised when | Scope of the abort |
//! |---------|-------------|--------------------|
//! | `Upstream` | status is neither 2xx nor 304 | current sub-operation |
//! | `Transport` | connect/timeout/read failure | current sub-operation |
//! | `Decode` | response body is not JSON | current sub-operation |
//! | `DataShape` | an expected field is missing or mistyped | one repository record, or all of commit sync |
//! | `Storage` | the store rejected a lookup or write | current sub-operation |

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("upstream returned {status} {reason} for {location}")]
    Upstream {
        location: String,
        status: u16,
        reason: String,
    },

    #[error("request to {location} failed: {source}")]
    Transport {
        location: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("response from {location} is not valid JSON: {source}")]
    Decode {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("field `{field}` missing or malformed in response from {location}")]
    DataShape { location: String, field: String },

    #[error("storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    pub fn data_shape(location: &str, field: &str) -> Self {
        SyncError::DataShape {
            location: location.to_string(),
            field: field.to_string(),
        }
    }

    /// Location of the request that failed, if the failure was tied to one.
    pub fn location(&self) -> Option<&str> {
        match self {
            SyncError::Upstream { location, .. }
            | SyncError::Transport { location, .. }
            | SyncError::Decode { location, .. }
            | SyncError::DataShape { location, .. } => Some(location),
            SyncError::Storage(_) => None,
        }
    }

    /// Short machine-friendly label used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncError::Upstream { .. } => "upstream",
            SyncError::Transport { .. } => "transport",
            SyncError::Decode { .. } => "decode",
            SyncError::DataShape { .. } => "data_shape",
            SyncError::Storage(_) => "storage",
        }
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
