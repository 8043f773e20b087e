// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Error types for the QuickSearch clients.
//!
//! Every failure surfaced by the SDK is an [`Error`]. Callers that only care
//! about success can propagate it with `?`; callers that need to react to a
//! specific condition match on the variant or on [`Error::kind`].

use serde_json::Value;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for QuickSearch operations
pub type Result<T> = std::result::Result<T, Error>;

/// A single offending field reported by local validation or by the service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Errors that can occur while talking to the QuickSearch service
#[derive(Debug, Error)]
pub enum Error {
    /// Credentials were missing or rejected (401)
    #[error("authentication failed: {message}")]
    Authentication { message: String },

    /// Credentials lack the permission for this operation (403)
    #[error("permission denied: {message}")]
    Permission { message: String },

    /// The request was rejected, either locally before sending or by the
    /// service (400/422)
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        /// 400 or 422 when raised by the service, `None` when raised locally
        status: Option<u16>,
        /// Offending fields, empty when the service gave no detail
        fields: Vec<FieldError>,
        /// Raw error detail from the service body, if any
        details: Option<Value>,
    },

    /// The API key exceeded its quota (429)
    #[error("rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after: Option<Duration>,
    },

    /// The service failed to process the request (5xx)
    #[error("server error ({status}): {message}")]
    Server { status: u16, message: String },

    /// The request never produced a response: refused connection, DNS or
    /// TLS failure, or timeout
    #[error("connection error: {message}")]
    Connection {
        message: String,
        timed_out: bool,
        #[source]
        source: Option<reqwest::Error>,
    },

    /// Any other non-success status code
    #[error("unexpected status code {status}: {message}")]
    Api { status: u16, message: String },

    /// A success response whose body could not be decoded
    #[error("invalid response body ({status}): {message}")]
    InvalidResponse { status: u16, message: String },

    /// The client was configured inconsistently
    #[error("invalid configuration: {0}")]
    Config(String),

    /// `ingest_event_batched` was called on a client without batching
    #[error("batching is not enabled for this client")]
    BatchingDisabled,

    /// The background batch queue reached its limit
    #[error("batch queue is full ({limit} events)")]
    QueueFull { limit: usize },

    /// The background batch processor has already shut down
    #[error("batch processor is not running")]
    ProcessorClosed,
}

/// Coarse classification of an [`Error`], handy for metrics and matching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Authentication,
    Permission,
    Validation,
    RateLimit,
    Server,
    Connection,
    Api,
    InvalidResponse,
    Config,
    Batching,
}

impl Error {
    /// Local validation failure naming the offending fields.
    pub(crate) fn invalid_fields(fields: Vec<FieldError>) -> Self {
        let message = fields
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ");
        Error::Validation {
            message,
            status: None,
            fields,
            details: None,
        }
    }

    pub(crate) fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::invalid_fields(vec![FieldError::new(field, message)])
    }

    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        let timed_out = err.is_timeout();
        let message = if timed_out {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        Error::Connection {
            message,
            timed_out,
            source: Some(err),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Authentication { .. } => ErrorKind::Authentication,
            Error::Permission { .. } => ErrorKind::Permission,
            Error::Validation { .. } => ErrorKind::Validation,
            Error::RateLimit { .. } => ErrorKind::RateLimit,
            Error::Server { .. } => ErrorKind::Server,
            Error::Connection { .. } => ErrorKind::Connection,
            Error::Api { .. } => ErrorKind::Api,
            Error::InvalidResponse { .. } => ErrorKind::InvalidResponse,
            Error::Config(_) => ErrorKind::Config,
            Error::BatchingDisabled | Error::QueueFull { .. } | Error::ProcessorClosed => {
                ErrorKind::Batching
            }
        }
    }

    /// HTTP status associated with the error, when one was received.
    ///
    /// Local validation failures report no status.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Authentication { .. } => Some(401),
            Error::Permission { .. } => Some(403),
            Error::Validation { status, .. } => *status,
            Error::RateLimit { .. } => Some(429),
            Error::Server { status, .. }
            | Error::Api { status, .. }
            | Error::InvalidResponse { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether repeating the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::RateLimit { .. } | Error::Server { .. } | Error::Connection { .. }
        )
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Connection { timed_out: true, .. })
    }

    /// Field-level validation detail, empty for every other variant.
    pub fn fields(&self) -> &[FieldError] {
        match self {
            Error::Validation { fields, .. } => fields,
            _ => &[],
        }
    }
}
