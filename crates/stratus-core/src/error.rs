//! Unified error types for every layer of Stratus.

use serde::{Deserialize, Serialize};
use std::fmt::{self, Debug};
use std::time::Duration;
use thiserror::Error;

/// Classification of a failed upstream call.
///
/// Retry and circuit-breaker policies are configured in terms of these kinds,
/// so the set is serializable and usable as a config value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The requested resource does not exist upstream.
    NotFound,
    /// The upstream rejected our credential.
    Unauthorized,
    /// Any other 4xx answer.
    UpstreamClientError,
    /// A 5xx answer or an unreadable body.
    UpstreamServerError,
    /// Connection, DNS or TLS failure.
    Network,
    /// The per-call deadline elapsed.
    Timeout,
    /// The circuit breaker rejected the call before it was attempted.
    CircuitOpen,
}

impl FailureKind {
    /// Kinds retried when no explicit list is configured.
    #[must_use]
    pub const fn is_retryable_by_default(&self) -> bool {
        matches!(
            self,
            Self::UpstreamServerError | Self::Network | Self::Timeout
        )
    }

    /// Kinds recorded as failures in the breaker window when no explicit list is configured.
    ///
    /// A not-found answer means the upstream is healthy and the data is absent.
    #[must_use]
    pub const fn counts_as_failure_by_default(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::UpstreamClientError
                | Self::UpstreamServerError
                | Self::Network
                | Self::Timeout
        )
    }

    /// Returns all kinds.
    #[must_use]
    pub const fn all() -> [Self; 7] {
        [
            Self::NotFound,
            Self::Unauthorized,
            Self::UpstreamClientError,
            Self::UpstreamServerError,
            Self::Network,
            Self::Timeout,
            Self::CircuitOpen,
        ]
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "not_found"),
            Self::Unauthorized => write!(f, "unauthorized"),
            Self::UpstreamClientError => write!(f, "upstream_client_error"),
            Self::UpstreamServerError => write!(f, "upstream_server_error"),
            Self::Network => write!(f, "network"),
            Self::Timeout => write!(f, "timeout"),
            Self::CircuitOpen => write!(f, "circuit_open"),
        }
    }
}

/// A classified failure of one upstream fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Resource not found upstream
    #[error("Upstream resource not found: {0}")]
    NotFound(String),

    /// Credential rejected by the upstream
    #[error("Upstream rejected credentials: {0}")]
    Unauthorized(String),

    /// Other 4xx status
    #[error("Upstream client error {status}: {message}")]
    ClientError { status: u16, message: String },

    /// 5xx status or malformed payload
    #[error("Upstream server error {status}: {message}")]
    ServerError { status: u16, message: String },

    /// Transport-level failure
    #[error("Network failure: {0}")]
    Network(String),

    /// Per-call deadline exceeded
    #[error("Upstream call timed out after {0:?}")]
    Timeout(Duration),

    /// Rejected by the circuit breaker, the upstream was not called
    #[error("Circuit breaker '{0}' is open")]
    CircuitOpen(String),
}

impl FetchError {
    /// Returns the failure classification.
    #[must_use]
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::NotFound(_) => FailureKind::NotFound,
            Self::Unauthorized(_) => FailureKind::Unauthorized,
            Self::ClientError { .. } => FailureKind::UpstreamClientError,
            Self::ServerError { .. } => FailureKind::UpstreamServerError,
            Self::Network(_) => FailureKind::Network,
            Self::Timeout(_) => FailureKind::Timeout,
            Self::CircuitOpen(_) => FailureKind::CircuitOpen,
        }
    }

    /// Creates a server error for an unreadable upstream body.
    #[must_use]
    pub fn malformed<T: Into<String>>(message: T) -> Self {
        Self::ServerError {
            status: 502,
            message: message.into(),
        }
    }
}

/// Unified error type for all layers of Stratus.
#[derive(Error, Debug)]
pub enum StratusError {
    // ============ Request Errors ============
    /// Malformed or out-of-range input
    #[error("Validation error: {0}")]
    Validation(String),

    /// Caller lacks the required role
    #[error("Forbidden: {0}")]
    Forbidden(String),

    // ============ Upstream Errors ============
    /// Resource not found upstream
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound {
        resource_type: &'static str,
        id: String,
    },

    /// Upstream rejected our credential (misconfiguration)
    #[error("Upstream authentication failed: {0}")]
    UpstreamAuth(String),

    /// Upstream could not serve the request, after retries or because the breaker is open
    #[error("Service unavailable for {operation}: {message}")]
    ServiceUnavailable {
        operation: String,
        message: String,
        #[source]
        cause: FetchError,
    },

    // ============ Cache Errors ============
    /// Tier I/O error
    #[error("Cache error: {0}")]
    Cache(String),

    /// Populating the cache failed, nothing was stored
    #[error("Failed to compute value for cache key '{key}': {source}")]
    ComputeFailed {
        key: String,
        #[source]
        source: Box<StratusError>,
    },

    // ============ Infrastructure Errors ============
    /// Configuration error
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StratusError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound { .. } => 404,
            Self::UpstreamAuth(_) => 502,
            Self::ServiceUnavailable { .. } => 503,
            Self::ComputeFailed { source, .. } => source.status_code(),
            Self::Cache(_) | Self::Configuration(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns a machine-readable error code.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::UpstreamAuth(_) => "UPSTREAM_AUTH_ERROR",
            Self::ServiceUnavailable { .. } => "SERVICE_UNAVAILABLE",
            Self::Cache(_) => "CACHE_ERROR",
            Self::ComputeFailed { source, .. } => source.error_code(),
            Self::Configuration(_) => "CONFIGURATION_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Creates a not found error for a resource.
    #[must_use]
    pub fn not_found<T: ToString>(resource_type: &'static str, id: T) -> Self {
        Self::NotFound {
            resource_type,
            id: id.to_string(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation<T: Into<String>>(message: T) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a forbidden error.
    #[must_use]
    pub fn forbidden<T: Into<String>>(message: T) -> Self {
        Self::Forbidden(message.into())
    }

    /// Creates a cache error.
    #[must_use]
    pub fn cache<T: Into<String>>(message: T) -> Self {
        Self::Cache(message.into())
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal<T: Into<String>>(message: T) -> Self {
        Self::Internal(message.into())
    }

    /// Creates a service-unavailable error carrying the upstream cause.
    #[must_use]
    pub fn service_unavailable(
        operation: impl Into<String>,
        message: impl Into<String>,
        cause: FetchError,
    ) -> Self {
        Self::ServiceUnavailable {
            operation: operation.into(),
            message: message.into(),
            cause,
        }
    }

    /// Wraps a loader failure for the given cache key.
    #[must_use]
    pub fn compute_failed(key: impl Into<String>, source: Self) -> Self {
        Self::ComputeFailed {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Returns the innermost error, unwrapping `ComputeFailed` layers.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::ComputeFailed { source, .. } => source.root(),
            other => other,
        }
    }

    /// Returns the upstream failure this error carries, if any.
    #[must_use]
    pub fn fetch_cause(&self) -> Option<&FetchError> {
        match self.root() {
            Self::ServiceUnavailable { cause, .. } => Some(cause),
            _ => None,
        }
    }
}

impl From<FetchError> for StratusError {
    fn from(err: FetchError) -> Self {
        match err {
            FetchError::NotFound(id) => Self::NotFound {
                resource_type: "upstream resource",
                id,
            },
            FetchError::Unauthorized(message) => Self::UpstreamAuth(message),
            other => Self::service_unavailable("upstream", other.to_string(), other),
        }
    }
}

impl From<serde_json::Error> for StratusError {
    fn from(err: serde_json::Error) -> Self {
        Self::Internal(format!("JSON serialization error: {}", err))
    }
}

/// Serializable error response for diagnostics and API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Machine-readable error code
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Upstream failure that caused the error, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<String>,
    /// Optional field-level errors for validation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<FieldError>>,
}

/// Field-level validation error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldError {
    /// Field name
    pub field: String,
    /// Error message
    pub message: String,
    /// Error code
    pub code: String,
}

impl ErrorResponse {
    /// Creates a new error response from a `StratusError`.
    #[must_use]
    pub fn from_error(error: &StratusError) -> Self {
        Self {
            code: error.error_code().to_string(),
            message: error.to_string(),
            cause: error.fetch_cause().map(ToString::to_string),
            details: None,
        }
    }

    /// Sets field-level validation errors.
    #[must_use]
    pub fn with_details(mut self, details: Vec<FieldError>) -> Self {
        self.details = Some(details);
        self
    }
}

impl From<&StratusError> for ErrorResponse {
    fn from(error: &StratusError) -> Self {
        Self::from_error(error)
    }
}
