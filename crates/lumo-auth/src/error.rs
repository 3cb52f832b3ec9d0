//! Authentication error types.

use lumo_storage::StorageError;
use std::collections::HashMap;
use thiserror::Error;

/// Structured failure reported by the identity server.
///
/// Every non-success HTTP response is translated into this shape, whatever
/// the body looked like on the wire.
#[derive(Error, Debug, Clone)]
#[error("HTTP {status_code}: {message}")]
pub struct ApiError {
    /// HTTP status of the failed response.
    pub status_code: u16,
    /// Human-readable message, always present.
    pub message: String,
    /// Machine-readable error code, when the server sent one.
    pub code: Option<String>,
    /// Per-field validation errors, when the server sent them.
    pub field_errors: Option<HashMap<String, Vec<String>>>,
}

/// Authentication error type.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Failure response from the identity server
    #[error("API error: {0}")]
    Api(#[from] ApiError),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// External login flow error
    #[error("External login error: {0}")]
    ExternalLogin(String),

    /// Invalid state transition in the login flow FSM
    #[error("Invalid login flow transition: {0}")]
    InvalidStateTransition(String),
}

impl AuthError {
    /// HTTP status of the underlying server failure, if this error carries one.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            AuthError::Api(api) => Some(api.status_code),
            AuthError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Returns true if this error is transient and the operation can be retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AuthError::Api(api) => api.status_code >= 500,
            AuthError::Http(e) => {
                if e.is_connect() || e.is_timeout() {
                    return true;
                }
                if let Some(status) = e.status() {
                    return status.is_server_error();
                }
                false
            }
            _ => false,
        }
    }
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn api_error(status_code: u16) -> ApiError {
        ApiError {
            status_code,
            message: "Invalid credentials".to_string(),
            code: Some("AUTH_INVALID".to_string()),
            field_errors: None,
        }
    }

    #[test]
    fn test_api_error_display() {
        assert_eq!(api_error(401).to_string(), "HTTP 401: Invalid credentials");
    }

    #[test]
    fn test_status_code_accessor() {
        let err: AuthError = api_error(422).into();
        assert_eq!(err.status_code(), Some(422));

        let err = AuthError::ExternalLogin("no token".to_string());
        assert_eq!(err.status_code(), None);
    }

    #[test]
    fn test_server_errors_are_transient() {
        assert!(AuthError::Api(api_error(503)).is_transient());
        assert!(!AuthError::Api(api_error(401)).is_transient());
    }
}
