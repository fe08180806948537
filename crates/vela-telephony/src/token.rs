//! Session token provider client
//!
//! Fetches short-lived telephony credentials from the CRM backend. Token
//! issuance commonly fails in environments without telephony configured, so
//! every failure mode maps to `AppError::TokenUnavailable` and callers
//! degrade instead of retrying.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use vela_core::traits::TokenProvider;
use vela_core::{AppError, AppResult};

/// Token endpoint response body
#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
}

/// HTTP client for the session token endpoint
pub struct HttpTokenProvider {
    url: String,
    client: reqwest::Client,
}

impl HttpTokenProvider {
    /// Create a provider for `url`. An empty `url` means calling is
    /// unprovisioned; every fetch then fails with `TokenUnavailable`.
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AppError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl TokenProvider for HttpTokenProvider {
    async fn fetch_token(&self, identity: &str) -> AppResult<String> {
        if self.url.is_empty() {
            return Err(AppError::TokenUnavailable(
                "no token endpoint configured".to_string(),
            ));
        }

        debug!("Fetching telephony token for {}", identity);

        let response = self
            .client
            .get(&self.url)
            .query(&[("identity", identity)])
            .send()
            .await
            .map_err(|e| AppError::TokenUnavailable(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::TokenUnavailable(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AppError::TokenUnavailable(format!("bad token response: {}", e)))?;

        match body.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err(AppError::TokenUnavailable(
                "token endpoint returned no usable token".to_string(),
            )),
        }
    }
}

/// Token provider that always returns a fixed token
///
/// Used by the simulate mode and tests, where no real provider credential
/// exists.
pub struct StaticTokenProvider {
    token: String,
}

impl StaticTokenProvider {
    /// Create a provider that always yields `token`
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn fetch_token(&self, _identity: &str) -> AppResult<String> {
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_response_parsing() {
        let ok: TokenResponse = serde_json::from_str(r#"{"token": "jwt-abc"}"#).unwrap();
        assert_eq!(ok.token.as_deref(), Some("jwt-abc"));

        // Empty bodies and error payloads both decode to "no token"
        let empty: TokenResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.token.is_none());

        let error_body: TokenResponse =
            serde_json::from_str(r#"{"error": "env vars not set"}"#).unwrap();
        assert!(error_body.token.is_none());
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_degrades() {
        let provider = HttpTokenProvider::new("", 1).unwrap();
        let err = provider.fetch_token("agent-1").await.unwrap_err();
        assert!(matches!(err, AppError::TokenUnavailable(_)));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_degrades() {
        // Nothing listens on this port; the transport error must surface as
        // TokenUnavailable, never panic or hang past the timeout.
        let provider = HttpTokenProvider::new("http://127.0.0.1:9/token", 1).unwrap();
        let err = provider.fetch_token("agent-1").await.unwrap_err();
        assert!(matches!(err, AppError::TokenUnavailable(_)));
    }

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticTokenProvider::new("fixed-token");
        assert_eq!(provider.fetch_token("anyone").await.unwrap(), "fixed-token");
    }
}
