//! Request and response types for the identity server API.

use serde::{Deserialize, Serialize};

/// A user account as reported by the identity server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub name: String,
}

/// Response to a successful login or signup.
///
/// `access_token` is absent on deployments that establish the session
/// through a cookie instead of a bearer token.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: User,
    #[serde(default)]
    pub access_token: Option<String>,
}

/// Credentials for a password login.
///
/// The server accepts either an email or a username as the identifier;
/// absent fields are omitted from the request body entirely.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub password: String,
}

impl LoginRequest {
    pub fn with_email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: Some(email.into()),
            username: None,
            password: password.into(),
        }
    }

    pub fn with_username(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: None,
            username: Some(username.into()),
            password: password.into(),
        }
    }
}

/// Details for creating a new account.
#[derive(Debug, Clone)]
pub struct SignupRequest {
    pub email: String,
    pub username: String,
    pub password: String,
}
