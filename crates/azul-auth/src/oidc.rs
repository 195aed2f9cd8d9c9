//! # OIDC Token Verification
//!
//! Verifies an ID token against trust material from the [`TrustCache`]:
//!
//! 1. Extract the token from the raw header value (`Bearer ` optional; the
//!    last whitespace-delimited word is taken).
//! 2. Fetch the discovery document and key set (cached, single-flight).
//! 3. Reject algorithms the IdP does not advertise.
//! 4. Verify the signature against each candidate key; check `aud` equals the
//!    client id, `iss` equals the discovery issuer, and `exp`/`nbf` against
//!    the current time. `at_hash` is not checked: these are ID tokens, not
//!    access tokens bound to a code exchange.
//! 5. Map claims to an [`Identity`] and attach an oauth [`Credential`].
//!
//! Every verification failure collapses to [`AuthError::AuthenticationFailed`].
//! The reason is logged with issuer and audience, never with the token.

use std::sync::Arc;

use jsonwebtoken::{decode, decode_header, Validation};
use serde_json::{Map, Value};

use crate::claims::ClaimsMapper;
use crate::config::OidcConfig;
use crate::error::AuthError;
use crate::identity::{Credential, Identity};
use crate::trust::{DiscoveryDocument, KeySet, TrustCache};

/// Pull the token out of an `Authorization` header value.
///
/// Returns `None` when nothing but whitespace is present.
pub fn extract_bearer(raw: &str) -> Option<&str> {
    raw.split_whitespace().last()
}

/// Verifies bearer tokens for one configured identity provider.
#[derive(Debug, Clone)]
pub struct OidcVerifier {
    discovery_url: String,
    client_id: String,
    mapper: ClaimsMapper,
    cache: Arc<TrustCache>,
}

impl OidcVerifier {
    pub fn new(config: &OidcConfig, cache: Arc<TrustCache>) -> Self {
        Self {
            discovery_url: config.discovery_url(),
            client_id: config.client_id.clone(),
            mapper: ClaimsMapper::new(&config.username_key, &config.roles_key),
            cache,
        }
    }

    pub fn discovery_url(&self) -> &str {
        &self.discovery_url
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Discovery document for the configured IdP, via the shared cache.
    pub async fn discovery(&self) -> Result<Arc<DiscoveryDocument>, AuthError> {
        Ok(self.cache.discover(&self.discovery_url).await?)
    }

    /// Verify a raw header value and return the caller's identity.
    pub async fn verify(&self, raw: &str) -> Result<Identity, AuthError> {
        let token = extract_bearer(raw).ok_or(AuthError::MissingCredential)?;

        let discovery = self.discovery().await?;
        let keys = self.cache.jwks(&discovery).await?;

        let claims = self.decode_claims(token, &discovery, &keys).map_err(|reason| {
            tracing::warn!(
                issuer = %discovery.issuer,
                audience = %self.client_id,
                reason = %reason,
                "not authenticated, bad jwt"
            );
            AuthError::AuthenticationFailed
        })?;

        let identity = self.mapper.map(claims).map_err(|e| {
            tracing::warn!(
                issuer = %discovery.issuer,
                audience = %self.client_id,
                reason = %e,
                "not authenticated, unusable claims"
            );
            AuthError::from(e)
        })?;

        let credential = Credential::oauth(identity.unique_id(), token);
        Ok(identity.with_credentials(credential))
    }

    /// Signature and registered-claim checks. The error is a log-safe reason.
    fn decode_claims(
        &self,
        token: &str,
        discovery: &DiscoveryDocument,
        keys: &KeySet,
    ) -> Result<Map<String, Value>, String> {
        let header = decode_header(token).map_err(|e| format!("malformed token: {e}"))?;

        if !discovery.algorithms().contains(&header.alg) {
            return Err(format!("algorithm {:?} not advertised by issuer", header.alg));
        }

        let mut validation = Validation::new(header.alg);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&[&discovery.issuer]);
        // `exp` and `nbf` are enforced when present but not required.
        validation.set_required_spec_claims(&["sub"]);
        validation.validate_exp = true;
        validation.validate_nbf = true;
        validation.leeway = 0;

        let mut last_error = String::from("no signing key matches token");
        for key in keys.candidates(header.kid.as_deref()) {
            let decoding_key = match key.decoding_key() {
                Ok(k) => k,
                Err(e) => {
                    last_error = format!("unusable signing key: {e}");
                    continue;
                }
            };
            match decode::<Map<String, Value>>(token, &decoding_key, &validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) => last_error = e.to_string(),
            }
        }
        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_bearer_strips_scheme() {
        assert_eq!(extract_bearer("Bearer abc.def.ghi"), Some("abc.def.ghi"));
        assert_eq!(extract_bearer("bearer   abc"), Some("abc"));
    }

    #[test]
    fn extract_bearer_tolerates_missing_scheme() {
        assert_eq!(extract_bearer("abc.def.ghi"), Some("abc.def.ghi"));
    }

    #[test]
    fn extract_bearer_empty_is_none() {
        assert_eq!(extract_bearer(""), None);
        assert_eq!(extract_bearer("   "), None);
    }
}
