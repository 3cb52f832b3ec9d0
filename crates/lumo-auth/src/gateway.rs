//! HTTP gateway to the identity server.
//!
//! Every outbound call goes through this module: it serializes JSON bodies,
//! attaches the stored bearer token when one exists, and translates failure
//! responses into [`ApiError`]. The gateway only reads the token store;
//! session state changes belong to the session service.

use crate::error::{ApiError, AuthError, AuthResult};
use lumo_storage::TokenStore;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Substituted when a failure body is not valid JSON.
const GENERIC_ERROR_MESSAGE: &str = "An unexpected error occurred";

/// Substituted when a failure body parses but carries no message.
const FALLBACK_ERROR_MESSAGE: &str = "API request failed";

/// Error body shape the identity server uses for failure responses.
#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    errors: Option<HashMap<String, Vec<String>>>,
}

impl ApiError {
    fn from_response(status_code: u16, body: &str) -> Self {
        match serde_json::from_str::<ErrorBody>(body) {
            Ok(parsed) => Self {
                status_code,
                message: parsed
                    .message
                    .unwrap_or_else(|| FALLBACK_ERROR_MESSAGE.to_string()),
                code: parsed.code,
                field_errors: parsed.errors,
            },
            Err(_) => Self {
                status_code,
                message: GENERIC_ERROR_MESSAGE.to_string(),
                code: None,
                field_errors: None,
            },
        }
    }
}

/// JSON request gateway with bearer-token injection.
#[derive(Clone)]
pub struct ApiGateway {
    http_client: Client,
    base_url: String,
    store: Arc<TokenStore>,
}

impl ApiGateway {
    /// Create a gateway for the given server base URL.
    pub fn new(base_url: impl Into<String>, store: Arc<TokenStore>) -> Self {
        // Cookies are kept for deployments that establish the session
        // through a Set-Cookie header instead of a bearer token.
        // reqwest::Client::new() panics on the same construction failure.
        let http_client = Client::builder()
            .cookie_store(true)
            .build()
            .expect("failed to construct HTTP client");

        Self {
            http_client,
            base_url: base_url.into(),
            store,
        }
    }

    /// Base URL this gateway targets.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON resource.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> AuthResult<T> {
        let response = self.execute(Method::GET, path, None::<&()>).await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body and decode a JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> AuthResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self.execute(Method::POST, path, Some(body)).await?;
        let response = Self::check_status(response).await?;
        Ok(response.json().await?)
    }

    /// POST where only the status matters, not the response body.
    pub async fn post_no_content<B>(&self, path: &str, body: Option<&B>) -> AuthResult<()>
    where
        B: Serialize + ?Sized,
    {
        let response = self.execute(Method::POST, path, body).await?;
        Self::check_status(response).await?;
        Ok(())
    }

    async fn execute<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> AuthResult<Response> {
        // The token is read fresh on every call so a login or logout that
        // raced this request is picked up immediately.
        let token = self.store.get_token()?;
        let url = format!("{}{}", self.base_url, path);

        debug!(method = %method, url = %url, authenticated = token.is_some(), "Sending API request");

        let mut request = self
            .http_client
            .request(method, &url)
            .header("Content-Type", "application/json");

        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {}", token));
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        Ok(request.send().await?)
    }

    async fn check_status(response: Response) -> AuthResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        warn!(status = %status, "API request failed");
        Err(AuthError::Api(ApiError::from_response(
            status.as_u16(),
            &body,
        )))
    }
}
