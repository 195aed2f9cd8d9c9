//! # Identity & Credential
//!
//! [`Identity`] is the canonical record of a verified caller. It is built
//! once per request by a validator strategy and never outlives the request.
//!
//! [`Credential`] records how the caller authenticated. It is attached to the
//! identity for the audit layer and must never be serialized back to a
//! client, so neither type implements `Serialize` and `Debug` on the
//! credential redacts the token.

use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::error::ClaimsError;

/// How the caller authenticated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CredentialFormat {
    /// Insecure fixed identity; no credential was checked.
    None,
    /// A bearer token verified against the identity provider.
    Oauth,
}

impl CredentialFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Oauth => "oauth",
        }
    }
}

/// Credential attached to an [`Identity`].
///
/// The raw token is wiped from memory when the credential is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    format: CredentialFormat,
    unique: String,
    token: Option<Zeroizing<String>>,
}

impl Credential {
    /// Credential for the insecure `none` strategy.
    pub fn none(unique: impl Into<String>) -> Self {
        Self {
            format: CredentialFormat::None,
            unique: unique.into(),
            token: None,
        }
    }

    /// Credential for a verified bearer token.
    pub fn oauth(unique: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            format: CredentialFormat::Oauth,
            unique: unique.into(),
            token: Some(Zeroizing::new(token.into())),
        }
    }

    pub fn format(&self) -> CredentialFormat {
        self.format
    }

    pub fn unique(&self) -> &str {
        &self.unique
    }

    /// The raw bearer token, if any.
    pub fn token(&self) -> Option<&str> {
        self.token.as_deref().map(String::as_str)
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("format", &self.format)
            .field("unique", &self.unique)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// A verified caller.
///
/// `unique_id` is guaranteed non-empty: the only constructor rejects an
/// empty value.
#[derive(Debug, Clone, PartialEq)]
pub struct Identity {
    username: String,
    organization: String,
    email: String,
    roles: Vec<String>,
    unique_id: String,
    raw_claims: Map<String, Value>,
    credentials: Option<Credential>,
}

impl Identity {
    /// Build an identity without credentials.
    ///
    /// Fails with [`ClaimsError::MissingSubject`] when `unique_id` is empty.
    pub fn new(
        username: impl Into<String>,
        organization: impl Into<String>,
        email: impl Into<String>,
        roles: Vec<String>,
        unique_id: impl Into<String>,
        raw_claims: Map<String, Value>,
    ) -> Result<Self, ClaimsError> {
        let unique_id = unique_id.into();
        if unique_id.is_empty() {
            return Err(ClaimsError::MissingSubject);
        }
        Ok(Self {
            username: username.into(),
            organization: organization.into(),
            email: email.into(),
            roles,
            unique_id,
            raw_claims,
            credentials: None,
        })
    }

    /// Attach the credential the caller authenticated with.
    pub fn with_credentials(mut self, credential: Credential) -> Self {
        self.credentials = Some(credential);
        self
    }

    /// A copy of this identity with the credential removed, safe to hand to
    /// anything that may serialize it.
    pub fn without_credentials(&self) -> Self {
        Self {
            credentials: None,
            ..self.clone()
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn roles(&self) -> &[String] {
        &self.roles
    }

    /// Whether the identity carries `role`.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn unique_id(&self) -> &str {
        &self.unique_id
    }

    /// The full verified claim set, kept for inspection and debugging.
    pub fn raw_claims(&self) -> &Map<String, Value> {
        &self.raw_claims
    }

    pub fn credentials(&self) -> Option<&Credential> {
        self.credentials.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity() -> Identity {
        Identity::new(
            "llama",
            "zoo",
            "llama@zoo.example",
            vec!["a".into(), "b".into()],
            "llama-sub",
            Map::new(),
        )
        .unwrap()
    }

    #[test]
    fn empty_unique_id_rejected() {
        let result = Identity::new("u", "o", "", vec![], "", Map::new());
        assert_eq!(result.unwrap_err(), ClaimsError::MissingSubject);
    }

    #[test]
    fn without_credentials_strips_token() {
        let id = identity().with_credentials(Credential::oauth("llama-sub", "tok.en.value"));
        assert_eq!(id.credentials().unwrap().token(), Some("tok.en.value"));

        let stripped = id.without_credentials();
        assert!(stripped.credentials().is_none());
        assert_eq!(stripped.username(), "llama");
        assert_eq!(stripped.unique_id(), "llama-sub");
    }

    #[test]
    fn credential_debug_redacts_token() {
        let cred = Credential::oauth("sub", "super-secret-token");
        let rendered = format!("{cred:?}");
        assert!(!rendered.contains("super-secret-token"));
        assert!(rendered.contains("[REDACTED]"));
    }

    #[test]
    fn identity_debug_never_contains_token() {
        let id = identity().with_credentials(Credential::oauth("llama-sub", "abc.def.ghi"));
        assert!(!format!("{id:?}").contains("abc.def.ghi"));
    }

    #[test]
    fn none_credential_has_no_token() {
        let cred = Credential::none("anony-moose");
        assert_eq!(cred.format(), CredentialFormat::None);
        assert_eq!(cred.format().as_str(), "none");
        assert_eq!(cred.unique(), "anony-moose");
        assert!(cred.token().is_none());
    }

    #[test]
    fn has_role_matches_exactly() {
        let id = identity();
        assert!(id.has_role("a"));
        assert!(!id.has_role("c"));
    }
}
