//! # Claims Mapping
//!
//! Maps a verified IdP claim set to an [`Identity`]. Pure: no I/O, no clock.
//!
//! ## Username resolution
//!
//! Confidential and daemon clients (Azure AD style) carry a non-zero
//! `azpacr` claim and no human username; their username is the authorized
//! party (`azp`). Everyone else uses the configured username claim.

use serde_json::{Map, Value};

use crate::error::ClaimsError;
use crate::identity::Identity;

/// Default claim holding a human username.
pub const DEFAULT_USERNAME_KEY: &str = "preferred_username";

/// Default claim holding the role list.
pub const DEFAULT_ROLES_KEY: &str = "roles";

/// Claim-to-identity mapper with configurable username and roles keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsMapper {
    username_key: String,
    roles_key: String,
}

impl Default for ClaimsMapper {
    fn default() -> Self {
        Self::new(DEFAULT_USERNAME_KEY, DEFAULT_ROLES_KEY)
    }
}

impl ClaimsMapper {
    pub fn new(username_key: impl Into<String>, roles_key: impl Into<String>) -> Self {
        Self {
            username_key: username_key.into(),
            roles_key: roles_key.into(),
        }
    }

    pub fn username_key(&self) -> &str {
        &self.username_key
    }

    pub fn roles_key(&self) -> &str {
        &self.roles_key
    }

    /// Map `claims` to an [`Identity`] without credentials.
    ///
    /// The full claim set is retained as the identity's raw claims.
    pub fn map(&self, claims: Map<String, Value>) -> Result<Identity, ClaimsError> {
        let unique_id = claims
            .get("sub")
            .and_then(scalar_string)
            .filter(|s| !s.is_empty())
            .ok_or(ClaimsError::MissingSubject)?;

        let username = if is_confidential_client(&claims) {
            required_string(&claims, "azp")?
        } else {
            required_string(&claims, &self.username_key)?
        };

        let organization = claims
            .get("org")
            .and_then(scalar_string)
            .unwrap_or_else(|| "unknown".to_string());

        let email = claims
            .get("email")
            .and_then(scalar_string)
            .unwrap_or_default();

        let roles = claims
            .get(&self.roles_key)
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(scalar_string)
                    .map(|role| strip_leading_separator(&role).to_string())
                    .collect()
            })
            .unwrap_or_default();

        Identity::new(username, organization, email, roles, unique_id, claims)
    }
}

/// `azpacr` present and not zero (string `"0"` or number `0`).
fn is_confidential_client(claims: &Map<String, Value>) -> bool {
    match claims.get("azpacr") {
        None | Some(Value::Null) => false,
        Some(Value::String(s)) => s != "0",
        Some(Value::Number(n)) => n.as_f64() != Some(0.0),
        Some(_) => true,
    }
}

fn required_string(claims: &Map<String, Value>, key: &str) -> Result<String, ClaimsError> {
    claims
        .get(key)
        .and_then(scalar_string)
        .ok_or_else(|| ClaimsError::MissingClaim(key.to_string()))
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Strip exactly one leading `/` (Keycloak group paths).
fn strip_leading_separator(role: &str) -> &str {
    role.strip_prefix('/').unwrap_or(role)
}
