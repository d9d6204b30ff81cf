//! Error types for the content cache
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::models::ErrorResponse;

// == Source Error Enum ==
/// Failure reaching or decoding the remote content source.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SourceError {
    /// Non-success HTTP status from the content source
    #[error("Content source returned HTTP {status}")]
    Http { status: u16 },

    /// The fetch exceeded its time budget
    #[error("Content source request timed out")]
    Timeout,

    /// Transport-level failure
    #[error("Network error: {0}")]
    Network(String),

    /// Body could not be decoded into the expected shape
    #[error("Malformed content source response: {0}")]
    Decode(String),
}

impl SourceError {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            SourceError::Http { status } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_decode() {
            SourceError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
            }
        } else {
            SourceError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for SourceError {
    fn from(err: serde_json::Error) -> Self {
        SourceError::Decode(err.to_string())
    }
}

// == Key-Value Store Error Enum ==
/// Failure of the persistent key-value capability behind the client tier.
#[derive(Error, Debug)]
pub enum KvError {
    /// Write rejected because the storage quota is exhausted
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// Backing storage could not be reached
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Stored bytes are not a valid record
    #[error("Stored value is malformed: {0}")]
    Malformed(String),
}

impl From<std::io::Error> for KvError {
    fn from(err: std::io::Error) -> Self {
        KvError::Unavailable(err.to_string())
    }
}

impl From<serde_json::Error> for KvError {
    fn from(err: serde_json::Error) -> Self {
        KvError::Malformed(err.to_string())
    }
}

// == App Error Enum ==
/// Unified error type for the HTTP surface.
#[derive(Error, Debug)]
pub enum AppError {
    /// Requested content does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request data
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Content source failure
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Source(SourceError::Http { status: 404 }) => StatusCode::NOT_FOUND,
            AppError::Source(SourceError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            AppError::Source(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the service and HTTP layers.
pub type Result<T> = std::result::Result<T, AppError>;
