//! Error and retry-policy types for the agent control API.
//!
//! [`TransportError`] covers failures of the underlying network operation,
//! including cancellation and timeout. [`StatusDecodeError`] is produced by the
//! health-status codec when a wire string is outside both vocabularies.
//! [`AgentError`] is what the [`crate::Agent`] façade returns.
//!
//! None of these are retried inside this crate. [`RetryPolicy`] exists so a
//! caller can drive its own retry loop from the error it received.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// ## Rules
///
/// - `Retryable` errors: connection failures, timeouts, `429` and `5xx`
///   responses.
/// - `NonRetryable` errors: cancellation, other `4xx` responses, malformed
///   requests and undecodable payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    Retryable {
        /// Minimum back-off before the next attempt. `None` means retry
        /// immediately or apply the caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried without caller intervention.
    NonRetryable,
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// Failure of the network operation underneath a request or a log stream.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The agent could not be reached.
    #[error("Failed to connect to agent: {message}")]
    Connect {
        /// Description from the HTTP stack.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Request to agent timed out")]
    Timeout,

    /// The operation was cancelled by the caller's cancellation token.
    #[error("Operation cancelled")]
    Cancelled,

    /// The agent answered with a non-success status code.
    #[error("Agent returned HTTP {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, usually a plain-text reason.
        body: String,
        /// Value of the `Retry-After` header, if the agent sent one.
        retry_after: Option<Duration>,
    },

    /// Reading the response body failed part-way through.
    #[error("Failed to read response body: {message}")]
    Body {
        /// Description from the HTTP stack or I/O layer.
        message: String,
    },

    /// The request could not be formed from the configured address and path.
    #[error("Invalid request '{path}': {message}")]
    InvalidRequest {
        /// API path that was being requested.
        path: String,
        /// Description from the URL parser.
        message: String,
    },

    /// The response body was not the JSON shape the caller expected.
    #[error("Failed to decode response: {message}")]
    Decode {
        /// Description from the JSON decoder.
        message: String,
    },
}

impl TransportError {
    /// Classifies this error for a caller-side retry loop.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            TransportError::Connect { .. } | TransportError::Timeout => {
                RetryPolicy::Retryable { after: None }
            }
            TransportError::Status {
                status,
                retry_after,
                ..
            } if *status == 429 || *status >= 500 => RetryPolicy::Retryable {
                after: *retry_after,
            },
            TransportError::Body { .. } => RetryPolicy::Retryable { after: None },
            TransportError::Cancelled
            | TransportError::Status { .. }
            | TransportError::InvalidRequest { .. }
            | TransportError::Decode { .. } => RetryPolicy::NonRetryable,
        }
    }

    /// Returns `true` when the failure was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TransportError::Cancelled)
    }
}

impl From<std::io::Error> for TransportError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::TimedOut => TransportError::Timeout,
            _ => TransportError::Body {
                message: err.to_string(),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Codec errors
// ---------------------------------------------------------------------------

/// A health-status string outside both wire vocabularies was received.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatusDecodeError {
    /// The value is not one of `pass`, `passing`, `warn`, `warning`, `fail`,
    /// `critical`.
    #[error("Invalid health status value: {value:?}")]
    InvalidStatus {
        /// The rejected wire string, verbatim.
        value: String,
    },
}

// ---------------------------------------------------------------------------
// Façade errors
// ---------------------------------------------------------------------------

/// Errors returned by [`crate::Agent`] operations.
#[derive(Debug, Clone, Error)]
pub enum AgentError {
    /// The underlying request or stream failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A health status in a response could not be decoded.
    #[error(transparent)]
    InvalidStatus(#[from] StatusDecodeError),

    /// A response lacked a field this client depends on.
    #[error("Response from {endpoint} is missing field {field}")]
    MissingField {
        /// Endpoint path that produced the response.
        endpoint: &'static str,
        /// Dotted path of the missing field.
        field: &'static str,
    },

    /// A caller-supplied argument was rejected before any request was sent.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },
}

impl AgentError {
    /// Returns `true` when the failure was caused by cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, AgentError::Transport(e) if e.is_cancelled())
    }
}

/// Shorthand result type for façade operations.
pub type AgentResult<T> = Result<T, AgentError>;
