//! Error types shared by the hosted-project storage implementation.

use reqwest::StatusCode;
use thiserror::Error;

use crate::dao::storage::StorageError;

/// Convenient result alias returning [`SupabaseDaoError`] failures.
pub type SupabaseResult<T> = Result<T, SupabaseDaoError>;

/// Failures that can occur while talking to the hosted project.
#[derive(Debug, Error)]
pub enum SupabaseDaoError {
    /// Required environment variable is missing.
    #[error("missing environment variable `{var}`")]
    MissingEnvVar { var: &'static str },
    /// Building the HTTP client failed (invalid TLS setup, etc).
    #[error("failed to build HTTP client")]
    ClientBuilder {
        #[source]
        source: reqwest::Error,
    },
    /// A request could not be sent.
    #[error("failed to send request to `{path}`")]
    RequestSend {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// The backend answered with an unexpected status code.
    #[error("unexpected response status {status} for `{path}`: {body}")]
    RequestStatus {
        path: String,
        status: StatusCode,
        body: String,
    },
    /// A unique constraint rejected the write.
    #[error("unique constraint violated on `{path}`: {message}")]
    UniqueViolation { path: String, message: String },
    /// Response payload could not be decoded.
    #[error("failed to decode response for `{path}`")]
    DecodeResponse {
        path: String,
        #[source]
        source: reqwest::Error,
    },
    /// A write asked for the stored representation but got none back.
    #[error("empty representation returned for `{path}`")]
    EmptyRepresentation { path: String },
}

impl From<SupabaseDaoError> for StorageError {
    fn from(err: SupabaseDaoError) -> Self {
        match err {
            SupabaseDaoError::UniqueViolation { message, .. } => StorageError::conflict(message),
            other => StorageError::unavailable(other.to_string(), other),
        }
    }
}
