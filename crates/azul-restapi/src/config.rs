//! # Server Configuration
//!
//! Everything is sourced from environment variables, grouped by prefix:
//!
//! | Prefix      | Struct             |
//! |-------------|--------------------|
//! | `RESTAPI_`  | [`ServerConfig`]   |
//! | `OIDC_`     | [`OidcConfig`]     |
//! | `LOGGER_`   | [`LoggingConfig`], [`AuditConfig`] |
//! | `CORS_`     | [`CorsConfig`]     |
//!
//! `RESTAPI_SECURITY` has no default. The insecure `none` mode has to be
//! asked for by name.

use std::path::PathBuf;
use std::str::FromStr;

use axum::http::{HeaderName, HeaderValue};
use azul_auth::config::env_parse;
use azul_auth::{OidcConfig, SecurityMode};
use thiserror::Error;

use crate::middleware::audit::DEFAULT_AUDIT_FORMAT;

/// Configuration errors. All of them are fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("RESTAPI_SECURITY must be set to one of: none, oidc, oidc_modern, oidc_legacy")]
    MissingSecurityMode,

    #[error(transparent)]
    Oidc(#[from] azul_auth::config::ConfigError),

    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

// ── Top level ───────────────────────────────────────────────────────

/// Complete process configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub security: SecurityMode,
    pub server: ServerConfig,
    pub oidc: OidcConfig,
    pub logging: LoggingConfig,
    pub audit: AuditConfig,
    pub cors: CorsConfig,
}

impl AppConfig {
    /// Defaults everywhere except the security mode.
    pub fn new(security: SecurityMode) -> Self {
        Self {
            security,
            server: ServerConfig::default(),
            oidc: OidcConfig::default(),
            logging: LoggingConfig::default(),
            audit: AuditConfig::default(),
            cors: CorsConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let security = match std::env::var("RESTAPI_SECURITY") {
            Ok(raw) if !raw.trim().is_empty() => raw.parse::<SecurityMode>()?,
            _ => return Err(ConfigError::MissingSecurityMode),
        };
        Ok(Self {
            security,
            server: ServerConfig::from_env()?,
            oidc: OidcConfig::from_env()?,
            logging: LoggingConfig::from_env()?,
            audit: AuditConfig::from_env()?,
            cors: CorsConfig::from_env()?,
        })
    }
}

// ── RESTAPI_ ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Mount point of the API routes and the OpenAPI document.
    pub prefix: String,
    /// Path the service is exposed under by a reverse proxy.
    pub root_path: String,
    /// Static headers added to every response.
    pub headers: Vec<(HeaderName, HeaderValue)>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 8080,
            prefix: "/api".to_string(),
            root_path: "/".to_string(),
            headers: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let headers = match std::env::var("RESTAPI_HEADERS") {
            Ok(raw) if !raw.trim().is_empty() => parse_headers(&raw)?,
            _ => defaults.headers,
        };
        Ok(Self {
            host: std::env::var("RESTAPI_HOST").unwrap_or(defaults.host),
            port: env_parse("RESTAPI_PORT", defaults.port)?,
            prefix: std::env::var("RESTAPI_PREFIX").unwrap_or(defaults.prefix),
            root_path: std::env::var("RESTAPI_ROOT_PATH").unwrap_or(defaults.root_path),
            headers,
        })
    }

    /// Prefix normalized to `/segment` form, or empty when mounted at `/`.
    pub fn api_prefix(&self) -> String {
        let trimmed = self.prefix.trim_matches('/');
        if trimmed.is_empty() {
            String::new()
        } else {
            format!("/{trimmed}")
        }
    }

    /// Root path without a trailing `/`, so `/` becomes empty.
    pub fn root_path(&self) -> &str {
        self.root_path.trim_end_matches('/')
    }
}

fn parse_headers(raw: &str) -> Result<Vec<(HeaderName, HeaderValue)>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid("RESTAPI_HEADERS".to_string(), reason);
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(raw).map_err(|e| invalid(e.to_string()))?;

    map.into_iter()
        .map(|(name, value)| {
            let value = match value {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            let name = HeaderName::from_str(name.trim())
                .map_err(|e| invalid(format!("{name}: {e}")))?;
            let value =
                HeaderValue::from_str(value.trim()).map_err(|e| invalid(format!("{name}: {e}")))?;
            Ok((name, value))
        })
        .collect()
}

// ── LOGGER_ ─────────────────────────────────────────────────────────

/// General application logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive. `RUST_LOG` takes precedence.
    pub level: String,
    /// Optional log file, rotated daily.
    pub file: Option<PathBuf>,
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            json: false,
        }
    }
}

impl LoggingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            level: std::env::var("LOGGER_LOG_LEVEL")
                .map(|l| l.to_lowercase())
                .unwrap_or(defaults.level),
            file: env_path("LOGGER_LOG_FILE"),
            json: env_flag("LOGGER_LOG_JSON", defaults.json)?,
        })
    }
}

/// How often the audit file rolls over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditRotation {
    Minutely,
    Hourly,
    Daily,
    Never,
}

impl FromStr for AuditRotation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "minutely" => Ok(Self::Minutely),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            "never" => Ok(Self::Never),
            other => Err(format!("unknown rotation {other:?}")),
        }
    }
}

/// Audit stream settings.
#[derive(Debug, Clone)]
pub struct AuditConfig {
    /// Audit file. `None` writes to stdout.
    pub file: Option<PathBuf>,
    pub format: String,
    pub rotation: AuditRotation,
    /// Request paths never audited (exact match).
    pub path_filter: Vec<String>,
    /// Response header carrying the security label.
    pub security_header: HeaderName,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            file: Some(PathBuf::from("./logs/restapi-audit.log")),
            format: DEFAULT_AUDIT_FORMAT.to_string(),
            rotation: AuditRotation::Daily,
            path_filter: vec!["/metrics".to_string()],
            security_header: HeaderName::from_static("x-azul-security"),
        }
    }
}

impl AuditConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let file = match std::env::var("LOGGER_AUDIT_FILE") {
            Ok(raw) if raw.trim().is_empty() => None,
            Ok(raw) => Some(PathBuf::from(raw)),
            Err(_) => defaults.file,
        };
        let security_header = match std::env::var("LOGGER_AUDIT_SECURITY_HEADER") {
            Ok(raw) if !raw.trim().is_empty() => HeaderName::from_str(raw.trim()).map_err(|e| {
                ConfigError::Invalid("LOGGER_AUDIT_SECURITY_HEADER".to_string(), e.to_string())
            })?,
            _ => defaults.security_header,
        };
        let rotation = match std::env::var("LOGGER_AUDIT_ROTATION") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .parse()
                .map_err(|e| ConfigError::Invalid("LOGGER_AUDIT_ROTATION".to_string(), e))?,
            _ => defaults.rotation,
        };
        Ok(Self {
            file,
            format: std::env::var("LOGGER_AUDIT_FORMAT").unwrap_or(defaults.format),
            rotation,
            path_filter: env_list("LOGGER_AUDIT_PATH_FILTER", defaults.path_filter)?,
            security_header,
        })
    }
}

// ── CORS_ ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsConfig {
    pub allow_origins: Vec<String>,
    pub allow_methods: Vec<String>,
    pub allow_headers: Vec<String>,
    pub allow_credentials: bool,
}

impl CorsConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            allow_origins: env_list("CORS_ALLOW_ORIGINS", Vec::new())?,
            allow_methods: env_list("CORS_ALLOW_METHODS", Vec::new())?,
            allow_headers: env_list("CORS_ALLOW_HEADERS", Vec::new())?,
            allow_credentials: env_flag("CORS_ALLOW_CREDENTIALS", false)?,
        })
    }

    /// CORS is only enabled when at least one origin is allowed.
    pub fn is_enabled(&self) -> bool {
        !self.allow_origins.is_empty()
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

fn env_flag(var: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => parse_flag(&raw)
            .ok_or_else(|| {
                ConfigError::Invalid(var.to_string(), format!("not a boolean: {raw:?}"))
            }),
        _ => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_list(var: &str, default: Vec<String>) -> Result<Vec<String>, ConfigError> {
    match std::env::var(var) {
        Ok(raw) if !raw.trim().is_empty() => parse_list(&raw)
            .map_err(|e| ConfigError::Invalid(var.to_string(), e)),
        _ => Ok(default),
    }
}

/// A JSON array of strings, or a comma-separated list.
fn parse_list(raw: &str) -> Result<Vec<String>, String> {
    let raw = raw.trim();
    if raw.starts_with('[') {
        return serde_json::from_str::<Vec<String>>(raw).map_err(|e| e.to_string());
    }
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect())
}
