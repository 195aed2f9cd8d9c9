//! # Application State
//!
//! Shared state passed to route handlers and middleware via the `State`
//! extractor. Everything here is built once at startup and read-only
//! afterwards; the only interior mutability lives inside the
//! [`TrustCache`].

use std::sync::Arc;

use azul_auth::{HttpFetcher, TokenValidator, TrustCache, TrustError, TrustFetcher};

use crate::config::AppConfig;
use crate::middleware::audit::{AuditRecorder, AuditSink};

#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub validator: Arc<TokenValidator>,
    pub audit: AuditRecorder,
}

impl AppState {
    /// Production wiring: HTTPS fetcher with the configured timeout and
    /// retry budget.
    pub fn new(config: AppConfig, sink: Arc<dyn AuditSink>) -> Result<Self, TrustError> {
        let fetcher = HttpFetcher::new(config.oidc.http_timeout, config.oidc.http_retries)?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher), sink))
    }

    /// Wiring with an arbitrary trust-material source.
    pub fn with_fetcher(
        config: AppConfig,
        fetcher: Arc<dyn TrustFetcher>,
        sink: Arc<dyn AuditSink>,
    ) -> Self {
        let cache = Arc::new(TrustCache::new(fetcher, config.oidc.cache_ttl));
        let validator = TokenValidator::from_config(config.security, &config.oidc, cache);
        let audit = AuditRecorder::new(&config.audit, config.server.root_path(), sink);
        Self {
            config: Arc::new(config),
            validator: Arc::new(validator),
            audit,
        }
    }
}
