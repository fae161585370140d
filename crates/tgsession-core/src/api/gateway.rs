//! HTTP client for a local messaging client gateway.
//!
//! The gateway owns the actual protocol connection. Each `GatewayClient`
//! maps to one gateway-side connection, created by `connect` and torn down
//! by `disconnect`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use super::client::{ClientFactory, Identity, RemoteClient, SignIn};
use super::error::{self, GatewayError, PASSWORD_NEEDED};
use crate::auth::{ApiCredentials, AuthError};

// ============================================================================
// Constants
// ============================================================================

/// Default gateway address when none is configured.
pub const DEFAULT_GATEWAY_URL: &str = "http://127.0.0.1:8081";

/// HTTP request timeout in seconds.
/// Login code delivery can be slow on the remote side, 30s covers it.
const REQUEST_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Serialize)]
struct ConnectRequest<'a> {
    api_id: i32,
    api_hash: &'a str,
    session: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct ConnectResponse {
    connection_id: String,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    authorized: bool,
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    session: String,
}

/// Creates `GatewayClient`s that share one HTTP connection pool.
#[derive(Clone)]
pub struct GatewayConnector {
    http: Client,
    base_url: String,
}

impl GatewayConnector {
    pub fn new(base_url: impl Into<String>) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl ClientFactory for GatewayConnector {
    type Client = GatewayClient;

    fn open(&self, credentials: &ApiCredentials, session: Option<&str>) -> GatewayClient {
        GatewayClient {
            http: self.http.clone(), // Cheap clone, shares connection pool
            base_url: self.base_url.clone(),
            credentials: credentials.clone(),
            session: session.map(str::to_string),
            connection_id: None,
        }
    }
}

pub struct GatewayClient {
    http: Client,
    base_url: String,
    credentials: ApiCredentials,
    session: Option<String>,
    connection_id: Option<String>,
}

impl GatewayClient {
    fn connection_url(&self, path: &str) -> Result<String, AuthError> {
        let id = self
            .connection_id
            .as_deref()
            .ok_or_else(|| AuthError::other("not connected to the client gateway"))?;
        Ok(format!("{}/connections/{}{}", self.base_url, id, path))
    }

    async fn send(request: RequestBuilder) -> Result<Response, AuthError> {
        let response = request.send().await?;
        Self::check_response(response).await
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, AuthError> {
        let response = Self::send(request).await?;
        response
            .json()
            .await
            .map_err(|e| AuthError::Other(format!("invalid gateway response: {}", e)))
    }

    async fn check_response(response: Response) -> Result<Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        debug!(%status, "Gateway returned an error");
        Err(error::from_status(status, &body))
    }
}

#[async_trait]
impl RemoteClient for GatewayClient {
    async fn connect(&mut self) -> Result<(), AuthError> {
        if self.connection_id.is_some() {
            return Ok(());
        }

        let url = format!("{}/connections", self.base_url);
        let body = ConnectRequest {
            api_id: self.credentials.api_id,
            api_hash: &self.credentials.api_hash,
            session: self.session.as_deref(),
        };
        let connected: ConnectResponse = Self::send_json(self.http.post(&url).json(&body)).await?;

        debug!(connection = %connected.connection_id, "Gateway connection opened");
        self.connection_id = Some(connected.connection_id);
        Ok(())
    }

    async fn disconnect(&mut self) {
        let Some(id) = self.connection_id.take() else {
            return;
        };
        let url = format!("{}/connections/{}", self.base_url, id);
        match Self::send(self.http.delete(&url)).await {
            Ok(_) => debug!(connection = %id, "Gateway connection closed"),
            Err(e) => warn!(connection = %id, error = %e, "Failed to close gateway connection"),
        }
    }

    async fn request_code(&mut self, phone: &str) -> Result<(), AuthError> {
        let url = self.connection_url("/auth/code")?;
        Self::send(
            self.http
                .post(&url)
                .json(&serde_json::json!({ "phone": phone })),
        )
        .await?;
        Ok(())
    }

    async fn sign_in(&mut self, phone: &str, code: &str) -> Result<SignIn, AuthError> {
        let url = self.connection_url("/auth/sign-in")?;
        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "phone": phone, "code": code }))
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(SignIn::Authorized);
        }

        let body = response.text().await.unwrap_or_default();
        match GatewayError::parse(&body) {
            Some(err) if err.error == PASSWORD_NEEDED => {
                Ok(SignIn::PasswordRequired { hint: err.hint })
            }
            _ => Err(error::from_status(status, &body)),
        }
    }

    async fn check_password(&mut self, password: &str) -> Result<(), AuthError> {
        let url = self.connection_url("/auth/password")?;
        Self::send(
            self.http
                .post(&url)
                .json(&serde_json::json!({ "password": password })),
        )
        .await?;
        Ok(())
    }

    async fn is_authorized(&mut self) -> Result<bool, AuthError> {
        let url = self.connection_url("/auth/status")?;
        let status: StatusResponse = Self::send_json(self.http.get(&url)).await?;
        Ok(status.authorized)
    }

    async fn who_am_i(&mut self) -> Result<Identity, AuthError> {
        let url = self.connection_url("/me")?;
        Self::send_json(self.http.get(&url)).await
    }

    async fn export_session(&mut self) -> Result<String, AuthError> {
        let url = self.connection_url("/session")?;
        let exported: SessionResponse = Self::send_json(self.http.get(&url)).await?;
        Ok(exported.session)
    }
}

// ============================================================================
// Tests
// ============================================================================
