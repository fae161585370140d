use serde::Deserialize;

use crate::auth::AuthError;

/// RPC error name the gateway returns when the account needs its 2FA password.
pub const PASSWORD_NEEDED: &str = "SESSION_PASSWORD_NEEDED";

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error body sent by the client gateway on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct GatewayError {
    pub error: String,
    #[serde(default)]
    pub hint: Option<String>,
}

impl GatewayError {
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body).ok()
    }

    /// Map the RPC error name onto the login flow's error taxonomy.
    pub fn into_auth_error(self) -> AuthError {
        match self.error.as_str() {
            "PHONE_CODE_INVALID" | "PHONE_CODE_EXPIRED" | "PHONE_CODE_EMPTY" => {
                AuthError::InvalidCode
            }
            "API_ID_INVALID" | "API_ID_PUBLISHED_FLOOD" => AuthError::InvalidCredentials,
            "PASSWORD_HASH_INVALID" => AuthError::InvalidPassword,
            _ => AuthError::Other(self.error),
        }
    }
}

/// Truncate a response body to avoid logging excessive data
fn truncate_body(body: &str) -> String {
    if body.len() <= MAX_ERROR_BODY_LENGTH {
        body.to_string()
    } else {
        let mut end = MAX_ERROR_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
    }
}

/// Build an `AuthError` from a failed gateway response.
///
/// Only explicit RPC error names count as rejected API credentials; a bare
/// status from a proxy in front of the gateway never does.
pub fn from_status(status: reqwest::StatusCode, body: &str) -> AuthError {
    if let Some(err) = GatewayError::parse(body) {
        return err.into_auth_error();
    }
    let truncated = truncate_body(body);
    match status.as_u16() {
        500..=599 => AuthError::Other(format!("gateway error {}: {}", status, truncated)),
        _ => AuthError::Other(format!("Status {}: {}", status, truncated)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_code_errors_map_to_invalid_code() {
        for name in ["PHONE_CODE_INVALID", "PHONE_CODE_EXPIRED", "PHONE_CODE_EMPTY"] {
            let body = format!(r#"{{"error":"{}"}}"#, name);
            assert_eq!(
                from_status(StatusCode::BAD_REQUEST, &body),
                AuthError::InvalidCode
            );
        }
    }

    #[test]
    fn test_api_id_errors_map_to_invalid_credentials() {
        let err = from_status(StatusCode::BAD_REQUEST, r#"{"error":"API_ID_INVALID"}"#);
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[test]
    fn test_bare_unauthorized_is_not_invalid_credentials() {
        let err = from_status(StatusCode::UNAUTHORIZED, "<html>401 Authorization Required</html>");
        match err {
            AuthError::Other(msg) => assert!(msg.contains("401")),
            other => panic!("unexpected error: {:?}", other),
        }

        let err = from_status(StatusCode::UNAUTHORIZED, r#"{"error":"API_ID_INVALID"}"#);
        assert_eq!(err, AuthError::InvalidCredentials);
    }

    #[test]
    fn test_unknown_rpc_error_keeps_name() {
        let err = from_status(StatusCode::BAD_REQUEST, r#"{"error":"FLOOD_WAIT_30"}"#);
        assert_eq!(err, AuthError::Other("FLOOD_WAIT_30".to_string()));
    }

    #[test]
    fn test_plain_body_is_truncated() {
        let body = "x".repeat(2000);
        match from_status(StatusCode::BAD_GATEWAY, &body) {
            AuthError::Other(msg) => {
                assert!(msg.contains("truncated, 2000 total bytes"));
                assert!(msg.len() < 700);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
