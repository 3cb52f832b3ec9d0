//! Storage key constants.

/// Storage keys used by the app
pub struct StorageKeys;

impl StorageKeys {
    /// The bearer token for the current session.
    ///
    /// Exactly zero or one value exists under this key per install.
    pub const SESSION_TOKEN: &'static str = "lumo_session_token";
}
