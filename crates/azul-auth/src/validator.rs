//! # Token Validator
//!
//! One strategy is chosen at startup from [`SecurityMode`] and shared across
//! requests. The two OIDC strategies validate tokens identically; they only
//! differ in how the HTTP layer advertises the security scheme to API docs.

use std::sync::Arc;

use serde_json::{json, Map, Value};

use crate::config::{OidcConfig, SecurityMode};
use crate::error::AuthError;
use crate::identity::{Credential, Identity};
use crate::oidc::OidcVerifier;
use crate::trust::TrustCache;

/// Username and subject of the fixed insecure identity.
pub const ANONYMOUS_USERNAME: &str = "anony-moose";
const ANONYMOUS_ORG: &str = "testing";
const ANONYMOUS_ROLE: &str = "validated";

/// Validation strategy.
#[derive(Debug, Clone)]
pub enum TokenValidator {
    /// Accept every request as the fixed insecure identity.
    NoAuth,
    OidcModern(OidcVerifier),
    OidcLegacy(OidcVerifier),
}

impl TokenValidator {
    pub fn from_config(mode: SecurityMode, oidc: &OidcConfig, cache: Arc<TrustCache>) -> Self {
        match mode {
            SecurityMode::None => {
                tracing::warn!(
                    "security provider is 'none': every request is accepted as {ANONYMOUS_USERNAME}"
                );
                Self::NoAuth
            }
            SecurityMode::OidcModern => Self::OidcModern(OidcVerifier::new(oidc, cache)),
            SecurityMode::OidcLegacy => Self::OidcLegacy(OidcVerifier::new(oidc, cache)),
        }
    }

    pub fn mode(&self) -> SecurityMode {
        match self {
            Self::NoAuth => SecurityMode::None,
            Self::OidcModern(_) => SecurityMode::OidcModern,
            Self::OidcLegacy(_) => SecurityMode::OidcLegacy,
        }
    }

    /// The OIDC verifier, when one is configured.
    pub fn verifier(&self) -> Option<&OidcVerifier> {
        match self {
            Self::NoAuth => None,
            Self::OidcModern(v) | Self::OidcLegacy(v) => Some(v),
        }
    }

    /// Resolve the caller's identity from the raw `Authorization` header.
    ///
    /// `NoAuth` ignores the header entirely. The OIDC strategies fail with
    /// [`AuthError::MissingCredential`] when it is absent or blank.
    pub async fn validate(&self, authorization: Option<&str>) -> Result<Identity, AuthError> {
        match self {
            Self::NoAuth => anonymous_identity(),
            Self::OidcModern(verifier) | Self::OidcLegacy(verifier) => {
                let raw = authorization.ok_or(AuthError::MissingCredential)?;
                verifier.verify(raw).await
            }
        }
    }
}

fn anonymous_identity() -> Result<Identity, AuthError> {
    let claims: Map<String, Value> = match json!({
        "username": ANONYMOUS_USERNAME,
        "org": ANONYMOUS_ORG,
        "roles": [ANONYMOUS_ROLE],
        "sub": ANONYMOUS_USERNAME,
    }) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    let identity = Identity::new(
        ANONYMOUS_USERNAME,
        ANONYMOUS_ORG,
        "",
        vec![ANONYMOUS_ROLE.to_string()],
        ANONYMOUS_USERNAME,
        claims,
    )?;
    Ok(identity.with_credentials(Credential::none(ANONYMOUS_USERNAME)))
}
