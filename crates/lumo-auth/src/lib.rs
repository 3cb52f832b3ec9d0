//! Authentication core for the Lumo client.
//!
//! This crate provides:
//! - A JSON request gateway with bearer-token injection and uniform error translation
//! - Session operations: login, signup, profile, logout, password reset
//! - External login through the system browser with a local redirect listener
//! - Token persistence through the platform secure store (`lumo-storage`)

mod config;
mod error;
mod external;
mod flow_fsm;
mod gateway;
mod session;
mod types;

pub use config::api_base_url;
pub use error::{ApiError, AuthError, AuthResult};
pub use external::{
    extract_token, ExternalLoginFlow, FlowHandle, FlowOutcome, FlowResult, DEFAULT_CALLBACK_PORT,
};
pub use flow_fsm::login_flow;
pub use flow_fsm::{LoginFlowInput, LoginFlowMachine, LoginFlowState};
pub use gateway::ApiGateway;
pub use session::SessionService;
pub use types::{AuthResponse, LoginRequest, SignupRequest, User};
