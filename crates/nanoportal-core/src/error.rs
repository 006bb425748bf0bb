//! Error types for nanoPortal

use http::StatusCode;
use serde::Serialize;
use std::fmt;

/// Result type alias for nanoPortal operations
pub type Result<T, E = PortalError> = std::result::Result<T, E>;

/// Error raised by application code reached through routing, or by the
/// portal itself while rendering a response.
///
/// "No route" is deliberately *not* a `PortalError`: the router reports it
/// as [`RouteOutcome::NotFound`](crate::RouteOutcome::NotFound) so the entry
/// point can tell a 404 apart from a failing handler.
#[derive(Debug, Clone)]
pub struct PortalError {
    /// HTTP status code
    pub status: StatusCode,
    /// Error type identifier
    pub kind: String,
    /// Human-readable error message
    pub message: String,
    /// Internal details (logged, never serialized)
    pub(crate) internal: Option<String>,
}

impl PortalError {
    /// Create a new error
    pub fn new(status: StatusCode, kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            status,
            kind: kind.into(),
            message: message.into(),
            internal: None,
        }
    }

    /// Create a 400 Bad Request error
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "bad_request", message)
    }

    /// Create a 403 Forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, "forbidden", message)
    }

    /// Create a 404 Not Found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "not_found", message)
    }

    /// Create a 500 Internal Server Error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", message)
    }

    /// Create a 503 Service Unavailable error
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "service_unavailable", message)
    }

    /// Add internal details (for logging, hidden from the response body)
    pub fn with_internal(mut self, details: impl Into<String>) -> Self {
        self.internal = Some(details.into());
        self
    }

    /// Internal details, if any
    pub fn internal_details(&self) -> Option<&str> {
        self.internal.as_deref()
    }

    /// Serialize into the JSON error body sent to clients.
    ///
    /// In production the message of a 5xx error is replaced by a generic one.
    pub(crate) fn to_body(&self, environment: &Environment) -> Vec<u8> {
        let message = if environment.is_production() && self.status.is_server_error() {
            "An internal error occurred".to_string()
        } else {
            self.message.clone()
        };
        let response = ErrorResponse {
            error: ErrorBody {
                error_type: self.kind.clone(),
                message,
            },
        };
        serde_json::to_vec(&response).unwrap_or_else(|_| {
            br#"{"error":{"type":"internal_error","message":"Failed to serialize error"}}"#.to_vec()
        })
    }
}

impl fmt::Display for PortalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for PortalError {}

#[derive(Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    #[serde(rename = "type")]
    error_type: String,
    message: String,
}

impl From<serde_json::Error> for PortalError {
    fn from(err: serde_json::Error) -> Self {
        PortalError::internal("Failed to serialize output").with_internal(err.to_string())
    }
}

impl From<std::io::Error> for PortalError {
    fn from(err: std::io::Error) -> Self {
        PortalError::internal("I/O error").with_internal(err.to_string())
    }
}

/// Deployment environment, detected from `NANOPORTAL_ENV`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    /// Verbose errors and debug logging
    Development,
    /// Masked error details
    Production,
    /// Any other value of `NANOPORTAL_ENV`
    Custom(String),
}

impl Environment {
    /// Detect the current environment.
    ///
    /// `production`/`prod` map to [`Environment::Production`], an unset
    /// variable or `development`/`dev` to [`Environment::Development`].
    pub fn current() -> Self {
        match std::env::var("NANOPORTAL_ENV").as_deref() {
            Ok("production") | Ok("prod") => Self::Production,
            Ok("development") | Ok("dev") | Err(_) => Self::Development,
            Ok(other) => Self::Custom(other.to_string()),
        }
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    /// Get the environment name
    pub fn as_str(&self) -> &str {
        match self {
            Self::Development => "development",
            Self::Production => "production",
            Self::Custom(name) => name,
        }
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::current()
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
