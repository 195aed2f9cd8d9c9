//! # Authentication Guard
//!
//! Route-level middleware that runs the configured [`TokenValidator`] and
//! makes the verified identity available to handlers and to the audit
//! middleware.
//!
//! Install with `Router::route_layer` so unmatched paths fall through to the
//! 404 handler instead of being challenged.
//!
//! ## CallerIdentity
//!
//! Every authenticated request gets a [`CallerIdentity`] injected into the
//! request extensions. Handlers extract it via the `FromRequestParts` impl.
//!
//! [`TokenValidator`]: azul_auth::TokenValidator

use std::sync::Arc;

use axum::extract::{Request, State};
use axum::http::header;
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use azul_auth::Identity;

use crate::context::RequestContext;
use crate::error::AppError;
use crate::state::AppState;

// ── CallerIdentity ──────────────────────────────────────────────────

/// Identity of the authenticated caller, available to route handlers via
/// Axum's `FromRequestParts`.
#[derive(Debug, Clone)]
pub struct CallerIdentity(pub Arc<Identity>);

impl std::ops::Deref for CallerIdentity {
    type Target = Identity;

    fn deref(&self) -> &Identity {
        &self.0
    }
}

/// Extracts the identity that the auth guard injected into extensions.
/// Returns 403 if none is present (the guard didn't run on this route).
#[axum::async_trait]
impl<S: Send + Sync> axum::extract::FromRequestParts<S> for CallerIdentity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CallerIdentity>()
            .cloned()
            .ok_or_else(|| AppError::Forbidden("Not authenticated".into()))
    }
}

// ── Middleware ──────────────────────────────────────────────────────

/// Validate the `Authorization` header and attach the caller's identity.
///
/// A header that is not valid UTF-8 is treated as a bad credential rather
/// than an absent one.
pub async fn auth_guard(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let raw = match request.headers().get(header::AUTHORIZATION) {
        None => None,
        Some(value) => match value.to_str() {
            Ok(s) => Some(s.to_string()),
            Err(_) => {
                tracing::warn!("authentication failed: authorization header is not valid text");
                return AppError::Unauthorized("Not authenticated, bad jwt".into()).into_response();
            }
        },
    };

    match state.validator.validate(raw.as_deref()).await {
        Ok(identity) => {
            let identity = Arc::new(identity);
            if let Some(context) = request.extensions().get::<RequestContext>() {
                context.set_identity(Arc::clone(&identity));
            }
            request.extensions_mut().insert(CallerIdentity(identity));
            next.run(request).await
        }
        Err(e) => {
            tracing::debug!(
                error = %e,
                path = %request.uri().path(),
                "request rejected by auth guard"
            );
            AppError::from(e).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::middleware::audit::MemorySink;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::middleware::from_fn_with_state;
    use axum::routing::get;
    use axum::Router;
    use azul_auth::SecurityMode;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_app(mode: SecurityMode) -> Router {
        let state = AppState::new(AppConfig::new(mode), Arc::new(MemorySink::new())).unwrap();
        Router::new()
            .route(
                "/whoami",
                get(|caller: CallerIdentity| async move { caller.username().to_string() }),
            )
            .route_layer(from_fn_with_state(state.clone(), auth_guard))
            .with_state(state)
    }

    #[tokio::test]
    async fn no_auth_mode_injects_fixed_identity() {
        let response = test_app(SecurityMode::None)
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"anony-moose");
    }

    #[tokio::test]
    async fn missing_header_is_forbidden_in_oidc_mode() {
        let response = test_app(SecurityMode::OidcModern)
            .oneshot(Request::builder().uri("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert!(response.headers().get(header::WWW_AUTHENTICATE).is_none());
    }

    #[tokio::test]
    async fn non_text_header_is_unauthorized() {
        let request = Request::builder()
            .uri("/whoami")
            .header(
                header::AUTHORIZATION,
                axum::http::HeaderValue::from_bytes(b"Bearer \xff\xfe").unwrap(),
            )
            .body(Body::empty())
            .unwrap();
        let response = test_app(SecurityMode::OidcModern).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(response.headers().get(header::WWW_AUTHENTICATE).unwrap(), "Bearer");
    }

    #[tokio::test]
    async fn extractor_without_guard_is_forbidden() {
        let app: Router = Router::new().route(
            "/open",
            get(|caller: CallerIdentity| async move { caller.username().to_string() }),
        );
        let response = app
            .oneshot(Request::builder().uri("/open").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }
}
