//! # azul-auth: Bearer Token Authentication
//!
//! Converts an inbound bearer credential into a verified [`Identity`].
//!
//! ## Components
//!
//! | Module        | Role                                                          |
//! |---------------|---------------------------------------------------------------|
//! | [`claims`]    | Pure mapping from an IdP claim set to an [`Identity`]          |
//! | [`identity`]  | Identity and credential records                               |
//! | [`trust`]     | Time-bounded, single-flight cache of discovery docs and JWKS   |
//! | [`oidc`]      | JWT signature and claims verification against trust material  |
//! | [`validator`] | Strategy selection: `none`, `oidc_modern`, `oidc_legacy`       |
//! | [`config`]    | Environment-sourced OIDC settings                             |
//!
//! ## Flow
//!
//! ```text
//! raw header ──► TokenValidator ──► OidcVerifier ──► TrustCache (discovery, JWKS)
//!                                        │
//!                                        └──► ClaimsMapper ──► Identity
//! ```
//!
//! This crate never issues tokens. It only verifies tokens issued by an
//! external identity provider, or synthesizes a fixed identity in the
//! insecure `none` mode.

pub mod claims;
pub mod config;
pub mod error;
pub mod identity;
pub mod oidc;
pub mod trust;
pub mod validator;

pub use claims::ClaimsMapper;
pub use config::{OidcConfig, SecurityMode};
pub use error::{AuthError, ClaimsError, TrustError};
pub use identity::{Credential, CredentialFormat, Identity};
pub use oidc::OidcVerifier;
pub use trust::{DiscoveryDocument, HttpFetcher, KeySet, TrustCache, TrustFetcher};
pub use validator::TokenValidator;
