//! Per-request carrier for the caller's identity.
//!
//! The audit middleware inserts a fresh [`RequestContext`] into the request
//! extensions before the request is routed. The auth guard fills it once
//! the token is verified; the audit middleware reads it back after the
//! handler has produced a response. The two share the slot through an
//! `Arc`, so the identity survives the request being moved into the router.

use std::sync::{Arc, OnceLock};

use azul_auth::Identity;

#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    identity: Arc<OnceLock<Arc<Identity>>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the verified identity. Only the first call takes effect.
    pub fn set_identity(&self, identity: Arc<Identity>) {
        if self.identity.set(identity).is_err() {
            tracing::debug!("request identity already set, keeping the first");
        }
    }

    pub fn identity(&self) -> Option<&Arc<Identity>> {
        self.identity.get()
    }

    /// Username for audit, `-` when no identity was resolved.
    pub fn username(&self) -> &str {
        self.identity().map_or("-", |identity| identity.username())
    }
}
