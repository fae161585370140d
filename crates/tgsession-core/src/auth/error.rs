use thiserror::Error;

/// Terminal failures of a login or verification attempt.
///
/// None of these are retried automatically; the operator restarts the flow.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid login code")]
    InvalidCode,

    #[error("Invalid API ID or API hash")]
    InvalidCredentials,

    #[error("Invalid two-step verification password")]
    InvalidPassword,

    #[error("Interrupted by operator")]
    Interrupted,

    #[error("Could not read input: {0}")]
    Prompt(String),

    #[error("Session request failed: {0}")]
    Other(String),
}

impl AuthError {
    pub fn other(message: impl Into<String>) -> Self {
        AuthError::Other(message.into())
    }
}

impl From<reqwest::Error> for AuthError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AuthError::Other("request to client gateway timed out".to_string())
        } else if err.is_connect() {
            AuthError::Other(format!("could not reach client gateway: {}", err))
        } else {
            AuthError::Other(err.to_string())
        }
    }
}
