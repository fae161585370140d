use anyhow::{Context, Result};
use keyring::Entry;
use thiserror::Error;

const SERVICE_NAME: &str = "tgsession";

/// API hashes issued by the service are 32 hex characters; anything under
/// 30 is certainly a typo.
const MIN_API_HASH_LEN: usize = 30;

/// Shortest plausible international number including the leading `+`.
const MIN_PHONE_LEN: usize = 11;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CredentialError {
    #[error("API ID must be a number")]
    InvalidApiId,

    #[error("API hash is too short")]
    ApiHashTooShort,

    #[error("Phone number must start with '+' and include the country code")]
    InvalidPhone,
}

/// Application credentials identifying this client to the messaging service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiCredentials {
    pub api_id: i32,
    pub api_hash: String,
}

impl ApiCredentials {
    /// Parse operator input for the API ID and hash.
    pub fn parse(api_id: &str, api_hash: &str) -> Result<Self, CredentialError> {
        let api_id = api_id
            .trim()
            .parse::<i32>()
            .map_err(|_| CredentialError::InvalidApiId)?;
        let api_hash = api_hash.trim();
        if api_hash.len() < MIN_API_HASH_LEN {
            return Err(CredentialError::ApiHashTooShort);
        }
        Ok(Self {
            api_id,
            api_hash: api_hash.to_string(),
        })
    }
}

/// Validate and normalize a phone number typed by the operator.
pub fn parse_phone(input: &str) -> Result<String, CredentialError> {
    let phone = input.trim();
    if phone.starts_with('+') && phone.len() >= MIN_PHONE_LEN {
        Ok(phone.to_string())
    } else {
        Err(CredentialError::InvalidPhone)
    }
}

/// Remembers API hashes in the OS keychain, keyed by API ID.
pub struct CredentialStore;

impl CredentialStore {
    fn entry(api_id: i32) -> Result<Entry> {
        Entry::new(SERVICE_NAME, &api_id.to_string()).context("Failed to create keyring entry")
    }

    /// Store the API hash for an API ID in the OS keychain
    pub fn store(credentials: &ApiCredentials) -> Result<()> {
        Self::entry(credentials.api_id)?
            .set_password(&credentials.api_hash)
            .context("Failed to store API hash in keychain")?;
        Ok(())
    }

    /// Retrieve the API hash for an API ID from the OS keychain
    pub fn get(api_id: i32) -> Result<ApiCredentials> {
        let api_hash = Self::entry(api_id)?
            .get_password()
            .context("Failed to retrieve API hash from keychain")?;
        Ok(ApiCredentials { api_id, api_hash })
    }

    pub fn delete(api_id: i32) -> Result<()> {
        Self::entry(api_id)?
            .delete_credential()
            .context("Failed to delete API hash from keychain")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HASH: &str = "0123456789abcdef0123456789abcdef";

    #[test]
    fn test_parse_credentials() {
        let creds = ApiCredentials::parse(" 12345 ", HASH).unwrap();
        assert_eq!(creds.api_id, 12345);
        assert_eq!(creds.api_hash, HASH);
    }

    #[test]
    fn test_parse_credentials_rejects_bad_input() {
        assert_eq!(
            ApiCredentials::parse("abc", HASH),
            Err(CredentialError::InvalidApiId)
        );
        assert_eq!(
            ApiCredentials::parse("12345", "short"),
            Err(CredentialError::ApiHashTooShort)
        );
    }

    #[test]
    fn test_parse_phone() {
        assert_eq!(parse_phone(" +821012345678 ").unwrap(), "+821012345678");
        assert_eq!(parse_phone("821012345678"), Err(CredentialError::InvalidPhone));
        assert_eq!(parse_phone("+8210"), Err(CredentialError::InvalidPhone));
    }
}
