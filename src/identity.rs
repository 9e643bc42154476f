//! Bearer-credential verification against the external identity provider.
//!
//! The gateway never issues credentials; it only exchanges a caller's
//! bearer token for a stable subject ID.  A provider rejection maps to
//! `None` (HTTP 401 at the dispatch layer); a provider outage is an
//! upstream error (HTTP 500).

use axum::http::HeaderMap;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use tracing::debug;

use crate::config::IdentityConfig;

/// Extract the raw token from an `Authorization: Bearer ...` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Async identity verification contract.
pub trait IdentityVerifier: Send + Sync + 'static {
    /// Exchange a bearer token for a subject ID.
    ///
    /// `Ok(None)` means the provider rejected the token; `Err` means the
    /// provider itself failed.
    fn verify(
        &self,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>>;
}

// -- Firebase-style introspection backend -------------------------------------

/// Default token-introspection endpoint.
const LOOKUP_ENDPOINT: &str = "https://identitytoolkit.googleapis.com/v1/accounts:lookup";

/// Verifies ID tokens by calling the provider's `accounts:lookup`
/// introspection endpoint.
pub struct FirebaseIdentityVerifier {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl FirebaseIdentityVerifier {
    pub fn new(config: &IdentityConfig) -> anyhow::Result<Self> {
        if config.api_key.is_empty() {
            return Err(anyhow::anyhow!("identity.api_key is required"));
        }
        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(10))
                .build()
                .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {e}"))?,
            api_key: config.api_key.clone(),
            endpoint: if config.lookup_endpoint.is_empty() {
                LOOKUP_ENDPOINT.to_string()
            } else {
                config.lookup_endpoint.clone()
            },
        })
    }
}

impl IdentityVerifier for FirebaseIdentityVerifier {
    fn verify(
        &self,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let token = token.to_string();
        Box::pin(async move {
            let url = format!("{}?key={}", self.endpoint, self.api_key);
            let resp = self
                .client
                .post(&url)
                .json(&serde_json::json!({ "idToken": token }))
                .send()
                .await
                .map_err(|e| anyhow::anyhow!("Identity provider request failed: {e}"))?;

            // The provider answers 400 for invalid/expired tokens; that is
            // a caller problem, not an outage.
            if resp.status() == reqwest::StatusCode::BAD_REQUEST {
                debug!("identity provider rejected token");
                return Ok(None);
            }
            if !resp.status().is_success() {
                let status = resp.status();
                let body = resp.text().await.unwrap_or_default();
                return Err(anyhow::anyhow!(
                    "Identity provider lookup failed ({status}): {body}"
                ));
            }

            let body: serde_json::Value = resp.json().await?;
            let subject = body
                .get("users")
                .and_then(|u| u.as_array())
                .and_then(|u| u.first())
                .and_then(|u| u.get("localId"))
                .and_then(|v| v.as_str())
                .map(str::to_string);
            Ok(subject)
        })
    }
}

// -- Static backend for development and tests ---------------------------------

/// Maps fixed bearer tokens to subject IDs. No network calls.
#[derive(Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, String>,
}

impl StaticIdentityVerifier {
    pub fn new(tokens: HashMap<String, String>) -> Self {
        Self { tokens }
    }
}

impl IdentityVerifier for StaticIdentityVerifier {
    fn verify(
        &self,
        token: &str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<Option<String>>> + Send + '_>> {
        let subject = self.tokens.get(token).cloned();
        Box::pin(async move { Ok(subject) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer abc123"));
        assert_eq!(bearer_token(&headers), Some("abc123"));
    }

    #[test]
    fn test_bearer_token_missing_or_malformed() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Basic abc123"));
        assert_eq!(bearer_token(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer "));
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_static_verifier() {
        let verifier = StaticIdentityVerifier::new(HashMap::from([(
            "tok-1".to_string(),
            "user-1".to_string(),
        )]));
        assert_eq!(
            verifier.verify("tok-1").await.unwrap(),
            Some("user-1".to_string())
        );
        assert_eq!(verifier.verify("nope").await.unwrap(), None);
    }
}
