//! OIDC and security-mode configuration.
//!
//! Loaded from `OIDC_*` environment variables. The discovery URL is always
//! derived from the authority URL; setting `OIDC_DISCOVERY_URL` directly is
//! rejected so the two cannot disagree.

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::claims::{DEFAULT_ROLES_KEY, DEFAULT_USERNAME_KEY};
use crate::trust::{DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, DEFAULT_TTL};

const WELL_KNOWN_SUFFIX: &str = "/.well-known/openid-configuration";

/// Token validation strategy, selected once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SecurityMode {
    /// Insecure: every request gets a fixed identity.
    None,
    /// OIDC, advertised to API docs via the discovery URL.
    OidcModern,
    /// OIDC, advertised to API docs via explicit authorization/token endpoints.
    OidcLegacy,
}

impl SecurityMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::OidcModern => "oidc_modern",
            Self::OidcLegacy => "oidc_legacy",
        }
    }
}

impl FromStr for SecurityMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "oidc" | "oidc_modern" => Ok(Self::OidcModern),
            "oidc_legacy" => Ok(Self::OidcLegacy),
            other => Err(ConfigError::UnknownSecurityMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for SecurityMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings for verifying tokens from an OIDC identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OidcConfig {
    /// Base URL of the IdP realm, without `/.well-known/...`.
    pub authority_url: String,
    /// Expected `aud` claim.
    pub client_id: String,
    /// Space-separated scopes advertised to API documentation.
    pub scopes: String,
    pub username_key: String,
    pub roles_key: String,
    /// How long discovery documents and key sets stay valid.
    pub cache_ttl: Duration,
    /// Per-call timeout for trust material fetches.
    pub http_timeout: Duration,
    /// Retry budget for trust material fetches.
    pub http_retries: u32,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            authority_url: "http://localhost:8080/auth/realms/azul".to_string(),
            client_id: "web".to_string(),
            scopes: "openid profile email offline_access".to_string(),
            username_key: DEFAULT_USERNAME_KEY.to_string(),
            roles_key: DEFAULT_ROLES_KEY.to_string(),
            cache_ttl: DEFAULT_TTL,
            http_timeout: DEFAULT_TIMEOUT,
            http_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl OidcConfig {
    /// Load from environment variables.
    ///
    /// Variables (all optional):
    /// - `OIDC_AUTHORITY_URL` (default: `http://localhost:8080/auth/realms/azul`)
    /// - `OIDC_CLIENT_ID` (default: `web`)
    /// - `OIDC_SCOPES` (default: `openid profile email offline_access`)
    /// - `OIDC_USERNAME_KEY` (default: `preferred_username`)
    /// - `OIDC_ROLES_KEY` (default: `roles`)
    /// - `OIDC_CACHE_TTL` seconds (default: 600)
    /// - `OIDC_HTTP_TIMEOUT_SECS` (default: 5)
    /// - `OIDC_HTTP_RETRIES` (default: 3)
    ///
    /// `OIDC_DISCOVERY_URL` must not be set.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(url) = std::env::var("OIDC_DISCOVERY_URL") {
            if !url.is_empty() {
                return Err(ConfigError::DiscoveryUrlSet(url));
            }
        }

        let defaults = Self::default();
        let authority_url = std::env::var("OIDC_AUTHORITY_URL").unwrap_or(defaults.authority_url);
        Url::parse(&authority_url).map_err(|e| {
            ConfigError::Invalid("OIDC_AUTHORITY_URL".to_string(), e.to_string())
        })?;

        Ok(Self {
            authority_url,
            client_id: std::env::var("OIDC_CLIENT_ID").unwrap_or(defaults.client_id),
            scopes: std::env::var("OIDC_SCOPES").unwrap_or(defaults.scopes),
            username_key: std::env::var("OIDC_USERNAME_KEY").unwrap_or(defaults.username_key),
            roles_key: std::env::var("OIDC_ROLES_KEY").unwrap_or(defaults.roles_key),
            cache_ttl: Duration::from_secs(env_parse(
                "OIDC_CACHE_TTL",
                defaults.cache_ttl.as_secs(),
            )?),
            http_timeout: Duration::from_secs(env_parse(
                "OIDC_HTTP_TIMEOUT_SECS",
                defaults.http_timeout.as_secs(),
            )?),
            http_retries: env_parse("OIDC_HTTP_RETRIES", defaults.http_retries)?,
        })
    }

    /// `{authority_url}/.well-known/openid-configuration`.
    pub fn discovery_url(&self) -> String {
        format!("{}{}", self.authority_url.trim_end_matches('/'), WELL_KNOWN_SUFFIX)
    }

    /// Scopes as a list.
    pub fn scope_list(&self) -> Vec<&str> {
        self.scopes.split_whitespace().collect()
    }
}

/// Parse an environment variable, falling back to `default` when unset.
pub fn env_parse<T>(var: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e: T::Err| ConfigError::Invalid(var.to_string(), e.to_string())),
        _ => Ok(default),
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown security provider: {0:?} (expected none, oidc, oidc_modern or oidc_legacy)")]
    UnknownSecurityMode(String),
    #[error("OIDC_DISCOVERY_URL must not be set (derived from OIDC_AUTHORITY_URL): {0}")]
    DiscoveryUrlSet(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}
