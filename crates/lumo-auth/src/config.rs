//! Client configuration.

use std::env;

/// Default identity server URL for local development.
const DEFAULT_API_BASE_URL: &str = "http://localhost:8000";

/// Resolve the identity server base URL.
///
/// `LUMO_API_URL` overrides the default; blank values are ignored and
/// trailing slashes are trimmed so paths can be appended directly.
pub fn api_base_url() -> String {
    resolve_base_url(env::var("LUMO_API_URL").ok())
}

fn resolve_base_url(raw: Option<String>) -> String {
    raw.filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}
