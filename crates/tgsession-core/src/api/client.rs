//! The remote messaging client as seen by the login flow.
//!
//! The wire protocol lives behind [`RemoteClient`]; this crate only drives
//! the sequence of calls and never builds or parses protocol messages.

use async_trait::async_trait;
use serde::Deserialize;

use crate::auth::{ApiCredentials, AuthError};

/// Result of submitting a login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignIn {
    Authorized,
    /// The account has two-step verification enabled.
    PasswordRequired { hint: Option<String> },
}

/// Account details returned by `who_am_i`, used for display only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Identity {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

impl Identity {
    /// First name, falling back to the username, then "Unknown".
    pub fn display_name(&self) -> &str {
        self.first_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or_else(|| self.username.as_deref().filter(|s| !s.is_empty()))
            .unwrap_or("Unknown")
    }
}

/// A single connection to the messaging service.
#[async_trait]
pub trait RemoteClient: Send {
    async fn connect(&mut self) -> Result<(), AuthError>;

    /// Tear the connection down. Must be safe to call after a failed `connect`.
    async fn disconnect(&mut self);

    async fn request_code(&mut self, phone: &str) -> Result<(), AuthError>;

    async fn sign_in(&mut self, phone: &str, code: &str) -> Result<SignIn, AuthError>;

    async fn check_password(&mut self, password: &str) -> Result<(), AuthError>;

    async fn is_authorized(&mut self) -> Result<bool, AuthError>;

    async fn who_am_i(&mut self) -> Result<Identity, AuthError>;

    /// Serialize the connection's authorization into an opaque session string.
    async fn export_session(&mut self) -> Result<String, AuthError>;
}

/// Opens connection-scoped clients.
pub trait ClientFactory: Send + Sync {
    type Client: RemoteClient;

    /// `session` is `None` for a fresh login and `Some(token)` to resume one.
    fn open(&self, credentials: &ApiCredentials, session: Option<&str>) -> Self::Client;
}
