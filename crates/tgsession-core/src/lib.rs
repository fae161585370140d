//! Core library for tgsession.
//!
//! Drives the login-code handshake against a messaging service, stores the
//! resulting session strings on disk, and checks stored ones still work.

pub mod api;
pub mod auth;
pub mod config;
pub mod store;

pub use config::Config;
