//! Authentication module for the login handshake and API credentials.
//!
//! This module provides:
//! - `SessionCreator`: drives the login-code handshake and session checks
//! - `ApiCredentials` / `CredentialStore`: API ID and hash, with the hash
//!   remembered in the OS keychain
//!
//! Connections are always released when a handshake ends, whatever the outcome.

pub mod credentials;
pub mod error;
pub mod flow;

pub use credentials::{parse_phone, ApiCredentials, CredentialError, CredentialStore};
pub use error::AuthError;
pub use flow::{
    interrupt_channel, wait_for_interrupt, AuthState, FlowEvent, Handshake, Interrupt, LoginPrompt,
    SessionCreator,
};
