//! External login through the system browser.
//!
//! The flow opens the provider authorization page in the user's browser,
//! listens for the redirect on a local callback server, and hands the token
//! from the redirect URL to the session service. The wait has no
//! programmatic timeout; a session only ends when the provider redirects
//! back or the app reports a cancel or dismissal through [`FlowHandle`].

use crate::error::{AuthError, AuthResult};
use crate::flow_fsm::{LoginFlowInput, LoginFlowMachine, LoginFlowState};
use crate::session::SessionService;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// Default port for the local redirect listener.
pub const DEFAULT_CALLBACK_PORT: u16 = 9876;

/// How a browser login session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlowOutcome {
    /// The provider redirected back into the app.
    Completed,
    /// The user cancelled the provider flow.
    Cancelled,
    /// The browser session ended without a definitive choice.
    Dismissed,
}

/// Result of a finished external login flow.
#[derive(Debug, Clone)]
pub struct FlowResult {
    pub outcome: FlowOutcome,
    /// The full redirect URL, present only for completed flows.
    pub return_url: Option<String>,
}

/// Signal that resolves a waiting flow, delivered exactly once.
#[derive(Debug)]
enum BrowserSignal {
    Redirected(String),
    Cancelled,
    Dismissed,
}

type SignalSlot = Arc<Mutex<Option<oneshot::Sender<BrowserSignal>>>>;

/// Finalizes a pending browser session from outside the flow.
///
/// `dismiss` is meant to be wired to the app-resume notification so a
/// session the user abandoned in the browser still reaches an outcome.
/// Once the flow has resolved, further calls are no-ops, so a late
/// resume event after a successful redirect cannot flip the result.
#[derive(Clone)]
pub struct FlowHandle {
    slot: SignalSlot,
}

impl FlowHandle {
    /// Resolve the pending session as cancelled by the user.
    pub fn cancel(&self) {
        if let Some(tx) = self.slot.lock().unwrap().take() {
            let _ = tx.send(BrowserSignal::Cancelled);
        }
    }

    /// Resolve the pending session as dismissed without a choice.
    pub fn dismiss(&self) {
        if let Some(tx) = self.slot.lock().unwrap().take() {
            let _ = tx.send(BrowserSignal::Dismissed);
        }
    }

    /// Whether a browser session is currently waiting to be resolved.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().unwrap().is_some()
    }
}

/// Controller for the browser-based login flow.
pub struct ExternalLoginFlow {
    port: u16,
    fsm: Mutex<LoginFlowMachine>,
    slot: SignalSlot,
}

impl ExternalLoginFlow {
    /// Create a flow that listens for the redirect on the given port.
    pub fn new(port: u16) -> Self {
        Self {
            port,
            fsm: Mutex::new(LoginFlowMachine::new()),
            slot: Arc::new(Mutex::new(None)),
        }
    }

    /// Create with the default callback port.
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_CALLBACK_PORT)
    }

    /// URL the provider redirects back to.
    pub fn callback_url(&self) -> String {
        format!("http://localhost:{}/callback", self.port)
    }

    /// Provider authorization URL with our callback attached.
    pub fn authorization_url(&self, api_base: &str) -> String {
        let query: String = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("redirect_uri", &self.callback_url())
            .finish();
        format!("{}/auth/google?{}", api_base, query)
    }

    /// Handle for resolving the pending session from app lifecycle hooks.
    pub fn handle(&self) -> FlowHandle {
        FlowHandle {
            slot: self.slot.clone(),
        }
    }

    /// Current flow state.
    pub fn state(&self) -> LoginFlowState {
        self.fsm.lock().unwrap().state().clone()
    }

    fn transition(&self, input: &LoginFlowInput) -> AuthResult<()> {
        let mut fsm = self.fsm.lock().unwrap();
        fsm.consume(input).map_err(|_| {
            AuthError::InvalidStateTransition(format!(
                "Cannot apply {:?} in state {:?}",
                input,
                fsm.state()
            ))
        })?;
        Ok(())
    }

    /// Run the external login flow to completion.
    ///
    /// Opens the browser, waits for the redirect (or a cancel/dismiss via
    /// the [`FlowHandle`]), and on a redirect that carries a token stores
    /// it through the session service. A redirect without a token fails
    /// the flow and leaves the stored session untouched.
    pub async fn login(&self, session: &SessionService) -> AuthResult<FlowResult> {
        self.transition(&LoginFlowInput::Initiate)?;

        let addr = format!("127.0.0.1:{}", self.port);
        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            AuthError::ExternalLogin(format!("Failed to bind to {}: {}", addr, e))
        })?;

        let (tx, rx) = oneshot::channel::<BrowserSignal>();
        *self.slot.lock().unwrap() = Some(tx);

        let auth_url = self.authorization_url(session.base_url());
        info!(port = self.port, url = %auth_url, "Opening external login session");

        // Best effort; the URL is in the log for environments without a browser
        if let Err(e) = open::that(&auth_url) {
            warn!("Failed to open browser: {}", e);
        }

        let server_handle = tokio::spawn({
            let slot = self.slot.clone();
            async move {
                loop {
                    match listener.accept().await {
                        Ok((mut socket, _)) => {
                            let slot = slot.clone();
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(&mut socket, slot).await {
                                    error!("Error handling redirect connection: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            error!("Accept error: {}", e);
                            break;
                        }
                    }
                }
            }
        });

        // No timeout: only the redirect, a cancel, or a dismiss resolves this
        let signal = rx.await.unwrap_or(BrowserSignal::Dismissed);

        server_handle.abort();

        match signal {
            BrowserSignal::Redirected(return_url) => {
                self.transition(&LoginFlowInput::RedirectReceived)?;
                match extract_token(&return_url) {
                    Some(token) => {
                        // Stored strictly after the browser session resolved
                        session.set_access_token(&token)?;
                        info!("External login completed");
                        Ok(FlowResult {
                            outcome: FlowOutcome::Completed,
                            return_url: Some(return_url),
                        })
                    }
                    None => {
                        warn!(url = %return_url, "Redirect arrived without a token parameter");
                        Err(AuthError::ExternalLogin(
                            "Redirect did not carry a token".to_string(),
                        ))
                    }
                }
            }
            BrowserSignal::Cancelled => {
                self.transition(&LoginFlowInput::UserCancelled)?;
                info!("External login cancelled by user");
                Ok(FlowResult {
                    outcome: FlowOutcome::Cancelled,
                    return_url: None,
                })
            }
            BrowserSignal::Dismissed => {
                self.transition(&LoginFlowInput::SessionDismissed)?;
                info!("External login session dismissed");
                Ok(FlowResult {
                    outcome: FlowOutcome::Dismissed,
                    return_url: None,
                })
            }
        }
    }
}

/// Extract the `token` query parameter from a redirect URL.
///
/// An empty value counts as absent.
pub fn extract_token(return_url: &str) -> Option<String> {
    let url = url::Url::parse(return_url).ok()?;
    url.query_pairs()
        .find(|(key, value)| key == "token" && !value.is_empty())
        .map(|(_, value)| value.into_owned())
}

/// Handle an incoming HTTP connection on the callback listener.
async fn handle_connection(
    socket: &mut tokio::net::TcpStream,
    slot: SignalSlot,
) -> AuthResult<()> {
    let (reader, mut writer) = socket.split();
    let mut reader = BufReader::new(reader);
    let mut request_line = String::new();
    reader.read_line(&mut request_line).await?;

    debug!(request = %request_line.trim(), "Received redirect request");

    // Parse the request line: GET /callback?... HTTP/1.1
    if !request_line.starts_with("GET ") {
        send_response(&mut writer, 405, "Method Not Allowed", "Method Not Allowed").await?;
        return Ok(());
    }

    let path_end = request_line.find(" HTTP/").unwrap_or(request_line.len());
    let path = &request_line[4..path_end];

    if !path.starts_with("/callback") {
        send_response(&mut writer, 404, "Not Found", "Not Found").await?;
        return Ok(());
    }

    // Reconstruct an absolute URL so the query can be parsed properly
    let return_url = format!("http://localhost{}", path);

    if extract_token(&return_url).is_some() {
        send_response(&mut writer, 200, "OK", &success_page()).await?;
    } else {
        send_response(&mut writer, 200, "OK", &missing_token_page()).await?;
    }

    if let Some(tx) = slot.lock().unwrap().take() {
        let _ = tx.send(BrowserSignal::Redirected(return_url));
    }

    Ok(())
}

/// Send an HTTP response.
async fn send_response(
    writer: &mut tokio::net::tcp::WriteHalf<'_>,
    status_code: u16,
    status_text: &str,
    body: &str,
) -> AuthResult<()> {
    let response = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status_code,
        status_text,
        body.len(),
        body
    );
    writer.write_all(response.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

/// Generate success page HTML.
fn success_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Lumo - Login Successful</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #22c55e; margin-bottom: 20px;">Login Successful!</h1>
<p style="color: #666;">You can close this window and return to Lumo.</p>
</div>
<script>setTimeout(() => window.close(), 2000);</script>
</body>
</html>"#
        .to_string()
}

/// Generate the page shown when the redirect carries no token.
fn missing_token_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head><title>Lumo - Login Failed</title></head>
<body style="font-family: system-ui; text-align: center; padding: 50px; background: #f5f5f5;">
<div style="max-width: 400px; margin: 0 auto; background: white; padding: 40px; border-radius: 8px; box-shadow: 0 2px 4px rgba(0,0,0,0.1);">
<h1 style="color: #ef4444; margin-bottom: 20px;">Login Failed</h1>
<p style="color: #666;">The login did not complete. You can close this window and try again.</p>
</div>
</body>
</html>"#
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_url() {
        let flow = ExternalLoginFlow::new(9876);
        assert_eq!(flow.callback_url(), "http://localhost:9876/callback");

        let flow = ExternalLoginFlow::with_defaults();
        assert_eq!(
            flow.callback_url(),
            format!("http://localhost:{}/callback", DEFAULT_CALLBACK_PORT)
        );
    }

    #[test]
    fn test_authorization_url_encodes_callback() {
        let flow = ExternalLoginFlow::new(9876);
        let auth_url = flow.authorization_url("https://api.lumo.app");

        assert!(auth_url.starts_with("https://api.lumo.app/auth/google?redirect_uri="));
        assert!(auth_url.contains("http%3A%2F%2Flocalhost%3A9876%2Fcallback"));
    }

    #[test]
    fn test_extract_token_first_param() {
        let token = extract_token("http://localhost:9876/callback?token=abc123");
        assert_eq!(token, Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_token_among_other_params() {
        let token = extract_token("http://localhost:9876/callback?state=xyz&token=abc123");
        assert_eq!(token, Some("abc123".to_string()));
    }

    #[test]
    fn test_extract_token_absent_or_empty() {
        assert_eq!(extract_token("http://localhost:9876/callback"), None);
        assert_eq!(extract_token("http://localhost:9876/callback?state=xyz"), None);
        assert_eq!(extract_token("http://localhost:9876/callback?token="), None);
        assert_eq!(extract_token("not a url"), None);
    }

    #[test]
    fn test_extract_token_url_decoded() {
        let token = extract_token("http://localhost:9876/callback?token=a%2Bb%3Dc");
        assert_eq!(token, Some("a+b=c".to_string()));
    }

    #[test]
    fn test_initial_state_is_idle() {
        let flow = ExternalLoginFlow::with_defaults();
        assert_eq!(flow.state(), LoginFlowState::Idle);
    }

    #[test]
    fn test_handle_is_noop_without_pending_session() {
        let flow = ExternalLoginFlow::with_defaults();
        let handle = flow.handle();

        assert!(!handle.is_pending());
        // No sender installed yet, so these must not panic or change state
        handle.cancel();
        handle.dismiss();
        assert_eq!(flow.state(), LoginFlowState::Idle);
    }
}
