//! Remote messaging client module.
//!
//! This module defines the `RemoteClient` capability the login flow drives,
//! and `GatewayClient`, which delegates the wire protocol to a local client
//! gateway over HTTP.

pub mod client;
pub mod error;
pub mod gateway;

pub use client::{ClientFactory, Identity, RemoteClient, SignIn};
pub use gateway::{GatewayClient, GatewayConnector, DEFAULT_GATEWAY_URL};
