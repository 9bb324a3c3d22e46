//! Error types for fetching and aggregating WebSoc sub-queries.

use thiserror::Error;

/// Errors from a single sub-query fetch. All of them are retried the same way.
#[derive(Debug, Error, Clone)]
pub enum FetchError {
    /// Network/HTTP request failed
    #[error("Network error: {message}")]
    Network { message: String },

    /// WebSoc answered with a non-success status
    #[error("WebSoc returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body did not match the expected tree shape
    #[error("Failed to decode WebSoc response: {message}")]
    Decode { message: String },

    /// Request did not complete within the client timeout
    #[error("Request timed out")]
    Timeout,
}

impl FetchError {
    /// Returns true if this error is retryable. WebSoc failures are not
    /// distinguished by cause, so every variant is.
    pub fn is_retryable(&self) -> bool {
        true
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout
        } else if err.is_decode() {
            FetchError::Decode {
                message: err.to_string(),
            }
        } else {
            FetchError::Network {
                message: err.to_string(),
            }
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode {
            message: err.to_string(),
        }
    }
}

/// The only errors that cross the aggregator boundary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The caller supplied an empty or malformed sub-query list
    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    /// The retry budget was spent
    #[error("WebSoc failed to respond too many times")]
    UpstreamUnavailable { rounds: u32, residual: usize },

    /// The caller cancelled the aggregation
    #[error("Aggregation cancelled")]
    Cancelled,
}

impl AggregateError {
    /// HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AggregateError::InvalidInput { .. } => 400,
            AggregateError::UpstreamUnavailable { .. } => 500,
            // nginx's "client closed request"
            AggregateError::Cancelled => 499,
        }
    }

    /// Returns true if the caller may retry the whole query later.
    pub fn is_transient(&self) -> bool {
        matches!(self, AggregateError::UpstreamUnavailable { .. })
    }
}

/// Errors from parsing a single loosely-structured text field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("Malformed time range: {0:?}")]
    TimeRange(String),

    #[error("Unknown day token in {0:?}")]
    Days(String),

    #[error("Malformed final exam: {0:?}")]
    FinalExam(String),
}
