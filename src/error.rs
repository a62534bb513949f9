// src/error.rs
//! Application error types with structured error handling.
//!
//! Error types form the vocabulary for failure modes in the system. The
//! retry loop never matches on strings: `AppError::retry_class` folds every
//! failure into the small taxonomy the fetcher acts on.

use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::constants::{RATE_LIMIT_DEFAULT_BACKOFF_SECS, TRANSIENT_BACKOFF_SECS};

/// Notion API error codes as a typed vocabulary.
///
/// Instead of matching against magic strings like `"rate_limited"`, the
/// domain vocabulary is encoded in the type system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotionErrorCode {
    /// API rate limit exceeded — back off and retry
    RateLimited,
    /// The requested object does not exist or is inaccessible
    ObjectNotFound,
    /// API key is invalid or expired
    Unauthorized,
    /// API key lacks permission for this resource
    RestrictedResource,
    /// Request body contains invalid JSON
    InvalidJson,
    /// Request parameters failed Notion's validation
    ValidationFailed,
    /// Conflict with current state of the resource
    Conflict,
    /// Notion internal server error
    InternalError,
    /// Notion is temporarily unavailable
    ServiceUnavailable,
    /// HTTP status code fallback when the error body is unparseable
    HttpStatus(u16),
    /// An error code this client doesn't recognize yet
    Unknown(String),
}

impl NotionErrorCode {
    /// Parse a Notion API error code string into the typed vocabulary.
    pub fn from_api_response(code: &str) -> Self {
        match code {
            "rate_limited" => Self::RateLimited,
            "object_not_found" => Self::ObjectNotFound,
            "unauthorized" => Self::Unauthorized,
            "restricted_resource" => Self::RestrictedResource,
            "invalid_json" => Self::InvalidJson,
            "validation_error" => Self::ValidationFailed,
            "conflict_error" => Self::Conflict,
            "internal_server_error" => Self::InternalError,
            "service_unavailable" => Self::ServiceUnavailable,
            other => Self::Unknown(other.to_string()),
        }
    }

    /// Create from an HTTP status code when the error body is unparseable.
    pub fn from_http_status(status: u16) -> Self {
        Self::HttpStatus(status)
    }

    /// Whether this code names a transient server-side failure.
    fn is_server_transient(&self) -> bool {
        matches!(
            self,
            Self::InternalError | Self::ServiceUnavailable | Self::HttpStatus(500..=599)
        )
    }
}

impl fmt::Display for NotionErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RateLimited => write!(f, "rate_limited"),
            Self::ObjectNotFound => write!(f, "object_not_found"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::RestrictedResource => write!(f, "restricted_resource"),
            Self::InvalidJson => write!(f, "invalid_json"),
            Self::ValidationFailed => write!(f, "validation_error"),
            Self::Conflict => write!(f, "conflict_error"),
            Self::InternalError => write!(f, "internal_server_error"),
            Self::ServiceUnavailable => write!(f, "service_unavailable"),
            Self::HttpStatus(code) => write!(f, "http_{}", code),
            Self::Unknown(code) => write!(f, "{}", code),
        }
    }
}

/// How the fetcher should react to a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryClass {
    /// Rate limited: sleep for the server-specified delay, then re-issue
    /// the same request.
    RateLimited(Duration),
    /// Server-side hiccup or request timeout: sleep a fixed backoff, then
    /// re-issue the same request.
    Transient(Duration),
    /// Everything else: surface to the caller.
    Fatal,
}

/// Main application error type.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Missing or invalid configuration: {0}")]
    Configuration(String),

    #[error("Network failure: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    #[error("Notion API returned an error ({code}): {message}")]
    NotionService {
        code: NotionErrorCode,
        message: String,
        /// Seconds from the `retry-after` header, when the API sent one.
        retry_after: Option<u64>,
    },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Retry budget of {budget:?} exhausted; last error: {last}")]
    RetryBudgetExhausted {
        budget: Duration,
        last: Box<AppError>,
    },

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Document sink rejected {id}: {message}")]
    Sink { id: String, message: String },
}

impl AppError {
    /// Classifies this error for the retry loop.
    ///
    /// Rate limits honor the server's `retry-after` (default 60s); 5xx-class
    /// failures and request timeouts back off 30s; anything else is fatal to
    /// the current fetch.
    pub fn retry_class(&self) -> RetryClass {
        match self {
            Self::NotionService {
                code: NotionErrorCode::RateLimited,
                retry_after,
                ..
            } => RetryClass::RateLimited(Duration::from_secs(
                retry_after.unwrap_or(RATE_LIMIT_DEFAULT_BACKOFF_SECS),
            )),
            Self::NotionService { code, .. } if code.is_server_transient() => {
                RetryClass::Transient(Duration::from_secs(TRANSIENT_BACKOFF_SECS))
            }
            Self::RequestTimeout(_) => {
                RetryClass::Transient(Duration::from_secs(TRANSIENT_BACKOFF_SECS))
            }
            Self::Network(err) if err.is_timeout() => {
                RetryClass::Transient(Duration::from_secs(TRANSIENT_BACKOFF_SECS))
            }
            _ => RetryClass::Fatal,
        }
    }
}
