//! Discovery document and signing key set, as fetched from the IdP.

use std::str::FromStr;

use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{Algorithm, DecodingKey};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use crate::error::TrustError;

/// OpenID Connect discovery document (`/.well-known/openid-configuration`).
///
/// `issuer`, `jwks_uri` and the advertised ID-token signing algorithms are
/// required; everything else is optional and kept in `extra`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DiscoveryDocument {
    pub issuer: String,
    pub jwks_uri: String,
    #[serde(default)]
    pub authorization_endpoint: Option<String>,
    #[serde(default)]
    pub token_endpoint: Option<String>,
    /// Accepts either a single string or a list.
    #[serde(
        rename = "id_token_signing_alg_values_supported",
        deserialize_with = "one_or_many"
    )]
    pub signing_algorithms: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl DiscoveryDocument {
    /// Parse a fetched JSON body.
    pub fn from_json(url: &str, body: Value) -> Result<Self, TrustError> {
        serde_json::from_value(body).map_err(|e| TrustError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    /// Advertised algorithms this verifier understands. Unknown names are
    /// dropped.
    pub fn algorithms(&self) -> Vec<Algorithm> {
        self.signing_algorithms
            .iter()
            .filter_map(|name| Algorithm::from_str(name).ok())
            .collect()
    }

    pub fn authorization_endpoint(&self) -> Result<&str, TrustError> {
        self.authorization_endpoint
            .as_deref()
            .ok_or(TrustError::MissingField("authorization_endpoint"))
    }

    pub fn token_endpoint(&self) -> Result<&str, TrustError> {
        self.token_endpoint
            .as_deref()
            .ok_or(TrustError::MissingField("token_endpoint"))
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(single) => vec![single],
        OneOrMany::Many(list) => list,
    })
}

/// One verification key.
#[derive(Clone)]
pub enum SigningKey {
    /// A JSON Web Key from a standard key set.
    Jwk(Box<Jwk>),
    /// A bare shared HMAC secret.
    SharedSecret(Zeroizing<Vec<u8>>),
}

impl SigningKey {
    /// Key id, when the key declares one.
    pub fn kid(&self) -> Option<&str> {
        match self {
            Self::Jwk(jwk) => jwk.common.key_id.as_deref(),
            Self::SharedSecret(_) => None,
        }
    }

    /// Build a decoding key. Fails for JWKs of an unsupported type.
    pub fn decoding_key(&self) -> Result<DecodingKey, jsonwebtoken::errors::Error> {
        match self {
            Self::Jwk(jwk) => DecodingKey::from_jwk(jwk),
            Self::SharedSecret(secret) => Ok(DecodingKey::from_secret(secret)),
        }
    }
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jwk(jwk) => f
                .debug_struct("Jwk")
                .field("kid", &jwk.common.key_id)
                .finish_non_exhaustive(),
            Self::SharedSecret(_) => f.write_str("SharedSecret([REDACTED])"),
        }
    }
}

/// Ordered signing keys published by the IdP.
#[derive(Debug, Clone, Default)]
pub struct KeySet {
    keys: Vec<SigningKey>,
}

impl KeySet {
    pub fn new(keys: Vec<SigningKey>) -> Self {
        Self { keys }
    }

    /// Parse a fetched JWKS body: either `{"keys": [...]}` or a bare JSON
    /// string holding a shared secret.
    pub fn from_json(url: &str, body: Value) -> Result<Self, TrustError> {
        match body {
            Value::String(secret) => Ok(Self::new(vec![SigningKey::SharedSecret(
                Zeroizing::new(secret.into_bytes()),
            )])),
            other => {
                let set: JwkSet =
                    serde_json::from_value(other).map_err(|e| TrustError::Malformed {
                        url: url.to_string(),
                        reason: e.to_string(),
                    })?;
                Ok(Self::new(
                    set.keys
                        .into_iter()
                        .map(|jwk| SigningKey::Jwk(Box::new(jwk)))
                        .collect(),
                ))
            }
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Keys that may have signed a token with header `kid`, in published
    /// order. Keys without a `kid` always qualify.
    pub fn candidates<'a>(&'a self, kid: Option<&'a str>) -> impl Iterator<Item = &'a SigningKey> {
        self.keys.iter().filter(move |key| match (kid, key.kid()) {
            (Some(wanted), Some(have)) => wanted == have,
            _ => true,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const URL: &str = "https://idp/.well-known/openid-configuration";

    #[test]
    fn discovery_accepts_single_algorithm_string() {
        let doc = DiscoveryDocument::from_json(
            URL,
            json!({
                "issuer": "https://idp",
                "jwks_uri": "https://idp/keys",
                "id_token_signing_alg_values_supported": "HS256",
            }),
        )
        .unwrap();
        assert_eq!(doc.signing_algorithms, vec!["HS256".to_string()]);
        assert_eq!(doc.algorithms(), vec![Algorithm::HS256]);
    }

    #[test]
    fn discovery_drops_unknown_algorithms() {
        let doc = DiscoveryDocument::from_json(
            URL,
            json!({
                "issuer": "https://idp",
                "jwks_uri": "https://idp/keys",
                "id_token_signing_alg_values_supported": ["RS256", "none", "ES256"],
                "token_endpoint": "https://idp/token",
            }),
        )
        .unwrap();
        assert_eq!(doc.algorithms(), vec![Algorithm::RS256, Algorithm::ES256]);
        assert_eq!(doc.token_endpoint().unwrap(), "https://idp/token");
        assert!(doc.authorization_endpoint().is_err());
    }

    #[test]
    fn discovery_keeps_extra_fields() {
        let doc = DiscoveryDocument::from_json(
            URL,
            json!({
                "issuer": "https://idp",
                "jwks_uri": "https://idp/keys",
                "id_token_signing_alg_values_supported": ["RS256"],
                "userinfo_endpoint": "https://idp/userinfo",
            }),
        )
        .unwrap();
        assert_eq!(doc.extra["userinfo_endpoint"], json!("https://idp/userinfo"));
    }

    #[test]
    fn discovery_missing_jwks_uri_is_malformed() {
        let err = DiscoveryDocument::from_json(
            URL,
            json!({
                "issuer": "https://idp",
                "id_token_signing_alg_values_supported": ["RS256"],
            }),
        )
        .unwrap_err();
        assert!(matches!(err, TrustError::Malformed { .. }));
        assert!(err.to_string().contains("jwks_uri"));
    }

    #[test]
    fn key_set_from_bare_secret() {
        let keys = KeySet::from_json("https://idp/keys", json!("shared-secret")).unwrap();
        assert_eq!(keys.len(), 1);
        assert!(keys.candidates(Some("any")).next().is_some());
        assert!(keys.candidates(None).next().unwrap().decoding_key().is_ok());
    }

    #[test]
    fn key_set_from_jwks_filters_by_kid() {
        let keys = KeySet::from_json(
            "https://idp/keys",
            json!({
                "keys": [
                    {"kty": "oct", "kid": "one", "k": "c2VjcmV0"},
                    {"kty": "oct", "kid": "two", "k": "b3RoZXI"},
                    {"kty": "oct", "k": "bm9raWQ"},
                ]
            }),
        )
        .unwrap();
        assert_eq!(keys.len(), 3);
        let kids: Vec<Option<&str>> = keys.candidates(Some("two")).map(|k| k.kid()).collect();
        assert_eq!(kids, vec![Some("two"), None]);
        assert_eq!(keys.candidates(None).count(), 3);
    }

    #[test]
    fn key_set_rejects_non_jwks_object() {
        let err = KeySet::from_json("https://idp/keys", json!({"nope": 1})).unwrap_err();
        assert!(matches!(err, TrustError::Malformed { .. }));
    }

    #[test]
    fn shared_secret_debug_is_redacted() {
        let keys = KeySet::from_json("https://idp/keys", json!("topsecret")).unwrap();
        let rendered = format!("{keys:?}");
        assert!(!rendered.contains("topsecret"));
        assert!(rendered.contains("REDACTED"));
    }
}
