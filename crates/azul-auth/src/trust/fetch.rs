//! Outbound retrieval of trust material.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use super::retry::retry_send;
use crate::error::TrustError;

/// Default per-call timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default retry budget after the first attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Source of JSON documents from the identity provider.
///
/// [`HttpFetcher`] is the production implementation; tests substitute
/// in-memory doubles.
#[async_trait]
pub trait TrustFetcher: Send + Sync {
    /// GET `url` and parse the body as JSON.
    async fn fetch_json(&self, url: &str) -> Result<Value, TrustError>;
}

/// HTTPS fetcher with a fixed timeout and retry budget.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: reqwest::Client,
    max_retries: u32,
}

impl HttpFetcher {
    pub fn new(timeout: Duration, max_retries: u32) -> Result<Self, TrustError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| TrustError::Http {
                url: "client_init".into(),
                source: Arc::new(e),
            })?;
        Ok(Self { http, max_retries })
    }
}

#[async_trait]
impl TrustFetcher for HttpFetcher {
    async fn fetch_json(&self, url: &str) -> Result<Value, TrustError> {
        tracing::debug!(url, "fetching trust material");

        let resp = retry_send(self.max_retries, || self.http.get(url).send())
            .await
            .map_err(|e| TrustError::Http {
                url: url.to_string(),
                source: Arc::new(e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TrustError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.json::<Value>().await.map_err(|e| TrustError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }
}
