//! Session operations against the identity server.
//!
//! `SessionService` owns the lifecycle of the local session: it performs the
//! credential exchanges, decides when the stored token changes, and exposes
//! the token store to callers that manage the session directly. The gateway
//! underneath never writes the store; persistence decisions all live here.

use crate::config;
use crate::error::AuthResult;
use crate::gateway::ApiGateway;
use crate::types::{AuthResponse, LoginRequest, SignupRequest, User};
use lumo_storage::TokenStore;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

/// Account creation body as the server expects it.
///
/// The server calls the display field `name`; the public [`SignupRequest`]
/// keeps the app-facing `username` wording and the rename happens here.
#[derive(Debug, Serialize)]
struct RegisterPayload<'a> {
    email: &'a str,
    name: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordResetRequestPayload<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct PasswordResetPayload<'a> {
    token: &'a str,
    password: &'a str,
}

/// High-level session operations: login, signup, profile, logout, password reset.
pub struct SessionService {
    gateway: ApiGateway,
    store: Arc<TokenStore>,
}

impl SessionService {
    /// Create a session service over an existing gateway and token store.
    pub fn new(gateway: ApiGateway, store: Arc<TokenStore>) -> Self {
        Self { gateway, store }
    }

    /// Create a session service using the platform secure store and the
    /// configured server URL.
    pub fn with_default_storage() -> AuthResult<Self> {
        let store = Arc::new(lumo_storage::create_token_store()?);
        let gateway = ApiGateway::new(config::api_base_url(), store.clone());
        Ok(Self::new(gateway, store))
    }

    /// Base URL of the identity server this service talks to.
    pub fn base_url(&self) -> &str {
        self.gateway.base_url()
    }

    /// Log in with email or username credentials.
    ///
    /// The token is persisted only after the server confirmed the login and
    /// only when the response carries one; a failed login leaves whatever
    /// token was stored before untouched.
    pub async fn login(&self, credentials: &LoginRequest) -> AuthResult<AuthResponse> {
        let response: AuthResponse = self.gateway.post("/auth/login", credentials).await?;

        if let Some(token) = &response.access_token {
            self.store.set_token(token)?;
        }

        info!(user_id = %response.user.id, "Login successful");
        Ok(response)
    }

    /// Create a new account and establish a session for it.
    pub async fn signup(&self, details: &SignupRequest) -> AuthResult<AuthResponse> {
        let payload = RegisterPayload {
            email: &details.email,
            name: &details.username,
            password: &details.password,
        };
        let response: AuthResponse = self.gateway.post("/auth/register", &payload).await?;

        if let Some(token) = &response.access_token {
            self.store.set_token(token)?;
        }

        info!(user_id = %response.user.id, "Signup successful");
        Ok(response)
    }

    /// Fetch the profile of the currently authenticated user.
    pub async fn get_profile(&self) -> AuthResult<User> {
        self.gateway.get("/auth/profile").await
    }

    /// End the session.
    ///
    /// The server is notified best-effort; a network or server failure is
    /// logged and swallowed so the local session always ends. A storage
    /// failure while clearing the token is the one thing that still fails
    /// the call, since the session would otherwise silently survive.
    pub async fn logout(&self) -> AuthResult<()> {
        if let Err(e) = self
            .gateway
            .post_no_content("/auth/logout", None::<&()>)
            .await
        {
            warn!("Logout failed on server: {}", e);
        }

        self.store.clear_token()?;
        info!("Logged out");
        Ok(())
    }

    /// Ask the server to start a password reset for the given email.
    pub async fn request_password_reset(&self, email: &str) -> AuthResult<()> {
        self.gateway
            .post_no_content(
                "/auth/password-reset-request",
                Some(&PasswordResetRequestPayload { email }),
            )
            .await
    }

    /// Complete a password reset with the token from the reset email.
    pub async fn reset_password(&self, token: &str, password: &str) -> AuthResult<()> {
        self.gateway
            .post_no_content(
                "/auth/password-reset",
                Some(&PasswordResetPayload { token, password }),
            )
            .await
    }

    /// Store a session token obtained outside the password flows, such as
    /// from an external login redirect.
    pub fn set_access_token(&self, token: &str) -> AuthResult<()> {
        self.store.set_token(token)?;
        Ok(())
    }

    /// Read the stored session token, if any.
    pub fn get_access_token(&self) -> AuthResult<Option<String>> {
        Ok(self.store.get_token()?)
    }

    /// Drop the stored session token without contacting the server.
    pub fn clear_access_token(&self) -> AuthResult<()> {
        self.store.clear_token()?;
        Ok(())
    }

    /// Whether a session token is currently stored.
    pub fn is_logged_in(&self) -> AuthResult<bool> {
        Ok(self.store.has_token()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumo_storage::{SecureStorage, StorageResult};
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory storage for testing.
    struct MemoryStorage {
        data: Mutex<HashMap<String, String>>,
    }

    impl MemoryStorage {
        fn new() -> Self {
            Self {
                data: Mutex::new(HashMap::new()),
            }
        }
    }

    impl SecureStorage for MemoryStorage {
        fn set(&self, key: &str, value: &str) -> StorageResult<()> {
            self.data
                .lock()
                .unwrap()
                .insert(key.to_string(), value.to_string());
            Ok(())
        }

        fn get(&self, key: &str) -> StorageResult<Option<String>> {
            Ok(self.data.lock().unwrap().get(key).cloned())
        }

        fn delete(&self, key: &str) -> StorageResult<bool> {
            Ok(self.data.lock().unwrap().remove(key).is_some())
        }
    }

    fn create_test_service() -> SessionService {
        let store = Arc::new(TokenStore::new(Box::new(MemoryStorage::new())));
        let gateway = ApiGateway::new("http://localhost:8000", store.clone());
        SessionService::new(gateway, store)
    }

    #[test]
    fn test_not_logged_in_initially() {
        let service = create_test_service();
        assert!(!service.is_logged_in().unwrap());
        assert_eq!(service.get_access_token().unwrap(), None);
    }

    #[test]
    fn test_token_passthrough() {
        let service = create_test_service();

        service.set_access_token("tok-123").unwrap();
        assert!(service.is_logged_in().unwrap());
        assert_eq!(
            service.get_access_token().unwrap(),
            Some("tok-123".to_string())
        );

        service.clear_access_token().unwrap();
        assert!(!service.is_logged_in().unwrap());

        // Clearing again is a no-op
        service.clear_access_token().unwrap();
    }

    #[test]
    fn test_register_payload_field_names() {
        let payload = RegisterPayload {
            email: "a@b.co",
            name: "ana",
            password: "pw",
        };
        let body = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            body,
            serde_json::json!({"email": "a@b.co", "name": "ana", "password": "pw"})
        );
    }
}
