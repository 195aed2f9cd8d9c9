//! # Authentication Error Types
//!
//! Three layers of failure:
//!
//! - [`ClaimsError`]: a verified claim set cannot be mapped to an identity.
//! - [`TrustError`]: discovery document or signing keys could not be obtained.
//! - [`AuthError`]: what the HTTP boundary sees. Client-side failures
//!   (absent or bad credential) are kept apart from infrastructure failures
//!   (IdP unreachable) so they surface with different status codes.
//!
//! None of these carry token material in their messages.

use std::sync::Arc;

use thiserror::Error;

/// Failure mapping a claim set to an [`Identity`](crate::Identity).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    /// The `sub` claim is absent or empty.
    #[error("unable to determine a valid unique identifier for user")]
    MissingSubject,

    /// A claim required to derive the username is absent or not a scalar.
    #[error("missing required claim: {0}")]
    MissingClaim(String),
}

/// Failure obtaining trust material from the identity provider.
///
/// Cloneable so one failed refresh can be reported to every caller that
/// was waiting on it.
#[derive(Error, Debug, Clone)]
pub enum TrustError {
    /// Transport failure after the retry budget was exhausted.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: Arc<reqwest::Error>,
    },

    /// The IdP answered with a non-success status.
    #[error("request to {url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The response body was not JSON, or not the expected shape.
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },

    /// The discovery document lacks a field this operation needs.
    #[error("discovery document missing field: {0}")]
    MissingField(&'static str),
}

/// Authentication outcome surfaced to the HTTP boundary.
#[derive(Error, Debug)]
pub enum AuthError {
    /// No bearer credential was presented at all.
    #[error("not authenticated")]
    MissingCredential,

    /// The credential was presented but is invalid: bad signature, expired,
    /// wrong audience or issuer, disallowed algorithm, or missing subject.
    /// Deliberately carries no detail.
    #[error("not authenticated, bad jwt")]
    AuthenticationFailed,

    /// Trust material could not be fetched; this is an infrastructure fault,
    /// not a caller fault.
    #[error("identity provider trust material unavailable: {0}")]
    TrustMaterialUnavailable(#[from] TrustError),
}

impl From<ClaimsError> for AuthError {
    fn from(_: ClaimsError) -> Self {
        Self::AuthenticationFailed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_subject_becomes_authentication_failed() {
        let err = AuthError::from(ClaimsError::MissingSubject);
        assert!(matches!(err, AuthError::AuthenticationFailed));
    }

    #[test]
    fn authentication_failed_message_is_generic() {
        assert_eq!(
            AuthError::AuthenticationFailed.to_string(),
            "not authenticated, bad jwt"
        );
    }

    #[test]
    fn trust_error_converts_to_unavailable() {
        let err = AuthError::from(TrustError::MissingField("token_endpoint"));
        match err {
            AuthError::TrustMaterialUnavailable(inner) => {
                assert!(inner.to_string().contains("token_endpoint"));
            }
            other => panic!("expected TrustMaterialUnavailable, got: {other:?}"),
        }
    }

    #[test]
    fn status_error_display_includes_url_and_code() {
        let err = TrustError::Status {
            url: "https://idp/keys".into(),
            status: 502,
        };
        let msg = err.to_string();
        assert!(msg.contains("https://idp/keys"));
        assert!(msg.contains("502"));
    }
}
