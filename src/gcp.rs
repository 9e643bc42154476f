//! OAuth2 access-token resolution for Google Cloud APIs.
//!
//! Both the Firestore document store and the GCS blob store authenticate
//! with the same bearer token, resolved via the Application Default
//! Credentials (ADC) chain:
//!
//! 1. `GOOGLE_OAUTH_ACCESS_TOKEN` environment variable (tests, CI)
//! 2. gcloud `application_default_credentials.json` (refresh-token flow)
//! 3. GCE metadata server (when running on Google Cloud)
//!
//! Tokens are cached per source with a 60 s safety margin before expiry.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Cached access token with expiry.
struct CachedToken {
    access_token: String,
    expiry: Instant,
}

/// Shared access-token source for Google APIs.
pub struct GcpTokenSource {
    client: reqwest::Client,
    token_cache: Mutex<Option<CachedToken>>,
}

impl GcpTokenSource {
    pub fn new(client: reqwest::Client) -> Self {
        Self {
            client,
            token_cache: Mutex::new(None),
        }
    }

    /// Get a bearer token, from cache when still valid.
    pub async fn access_token(&self) -> anyhow::Result<String> {
        {
            let cache = self.token_cache.lock().expect("token cache mutex poisoned");
            if let Some(ref cached) = *cache {
                if cached.expiry > Instant::now() {
                    return Ok(cached.access_token.clone());
                }
            }
        }

        let (token, expires_in) = self.fetch_access_token().await?;

        // Cache with 60s safety margin.
        let expiry = Instant::now() + Duration::from_secs(expires_in.saturating_sub(60));
        {
            let mut cache = self.token_cache.lock().expect("token cache mutex poisoned");
            *cache = Some(CachedToken {
                access_token: token.clone(),
                expiry,
            });
        }

        Ok(token)
    }

    /// Fetch a fresh token from the first credential source that works.
    async fn fetch_access_token(&self) -> anyhow::Result<(String, u64)> {
        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            return Ok((token, 3600));
        }

        let adc_path = Self::application_default_credentials_path();
        if let Ok(true) = tokio::fs::try_exists(&adc_path).await {
            return self.token_from_adc_file(&adc_path).await;
        }

        self.token_from_metadata_server().await
    }

    /// Path to gcloud application-default credentials.
    fn application_default_credentials_path() -> String {
        if let Ok(config_dir) = std::env::var("CLOUDSDK_CONFIG") {
            return format!("{config_dir}/application_default_credentials.json");
        }
        if let Ok(home) = std::env::var("HOME") {
            return format!("{home}/.config/gcloud/application_default_credentials.json");
        }
        ".config/gcloud/application_default_credentials.json".to_string()
    }

    /// Obtain a token from a gcloud ADC file via the refresh-token flow.
    async fn token_from_adc_file(&self, adc_path: &str) -> anyhow::Result<(String, u64)> {
        let contents = tokio::fs::read_to_string(adc_path)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read ADC file {adc_path}: {e}"))?;
        let creds: serde_json::Value = serde_json::from_str(&contents)
            .map_err(|e| anyhow::anyhow!("Failed to parse ADC file: {e}"))?;

        let cred_type = creds.get("type").and_then(|v| v.as_str()).unwrap_or("");
        if cred_type != "authorized_user" {
            return Err(anyhow::anyhow!(
                "Unsupported credential type in ADC file: {cred_type}"
            ));
        }

        let resp = self
            .client
            .post("https://oauth2.googleapis.com/token")
            .form(&[
                (
                    "client_id",
                    creds.get("client_id").and_then(|v| v.as_str()).unwrap_or(""),
                ),
                (
                    "client_secret",
                    creds
                        .get("client_secret")
                        .and_then(|v| v.as_str())
                        .unwrap_or(""),
                ),
                (
                    "refresh_token",
                    creds
                        .get("refresh_token")
                        .and_then(|v| v.as_str())
                        .unwrap_or(""),
                ),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Token refresh request failed: {e}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("Token refresh failed ({status}): {body}"));
        }

        Self::parse_token_response(resp.json().await?)
    }

    /// Obtain a token from the GCE metadata server.
    async fn token_from_metadata_server(&self) -> anyhow::Result<(String, u64)> {
        let resp = self
            .client
            .get("http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token")
            .header("Metadata-Flavor", "Google")
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("Metadata server request failed: {e}. \
                Run 'gcloud auth application-default login' or set GOOGLE_OAUTH_ACCESS_TOKEN."))?;

        if !resp.status().is_success() {
            return Err(anyhow::anyhow!(
                "Metadata server returned {}: set GOOGLE_OAUTH_ACCESS_TOKEN or configure ADC",
                resp.status()
            ));
        }

        Self::parse_token_response(resp.json().await?)
    }

    fn parse_token_response(body: serde_json::Value) -> anyhow::Result<(String, u64)> {
        let access_token = body
            .get("access_token")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("No access_token in token response"))?
            .to_string();
        let expires_in = body
            .get("expires_in")
            .and_then(|v| v.as_u64())
            .unwrap_or(3600);
        Ok((access_token, expires_in))
    }
}
