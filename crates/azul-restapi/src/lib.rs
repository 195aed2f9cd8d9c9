//! # azul-restapi: Axum REST API Server for Azul
//!
//! Hosts the Azul API routes behind a pluggable bearer-token guard and
//! records every HTTP transaction to a dedicated audit stream.
//!
//! ## API Surface
//!
//! | Path                          | Module             | Auth     |
//! |-------------------------------|--------------------|----------|
//! | `/health/liveness`            | this module        | none     |
//! | `/health/readiness`           | this module        | none     |
//! | `{prefix}/openapi.json`       | [`openapi`]        | none     |
//! | `{prefix}/v0/users/me`        | [`routes::users`]  | required |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Audit → StaticHeaders → CORS → Trace → Routing → AuthGuard (route layer) → Handler
//! ```
//!
//! Audit is outermost so it observes the final status and any security
//! label set by handlers, and appends `X-Username` last.

pub mod auth;
pub mod config;
pub mod context;
pub mod error;
pub mod logging;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::Router;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::error::AppError;
use crate::state::AppState;

/// Assemble the full application router with all routes and middleware.
///
/// Health probes are mounted outside the auth guard so they remain
/// accessible without credentials. They are still audited.
pub fn app(state: AppState) -> Router {
    let api = Router::new()
        .merge(routes::users::router(state.clone()))
        .merge(openapi::router());

    let prefix = state.config.server.api_prefix();
    let routed = if prefix.is_empty() {
        Router::new().merge(api)
    } else {
        Router::new().nest(&prefix, api)
    };

    let mut router = routed
        .route("/health/liveness", get(liveness))
        .route("/health/readiness", get(readiness))
        .fallback(not_found)
        .layer(middleware::tracing_layer::layer());

    if let Some(cors) = middleware::cors::layer(&state.config.cors) {
        router = router.layer(cors);
    }
    for (name, value) in &state.config.server.headers {
        router = router.layer(SetResponseHeaderLayer::overriding(name.clone(), value.clone()));
    }

    router
        .layer(from_fn_with_state(
            state.audit.clone(),
            middleware::audit::audit_middleware,
        ))
        .with_state(state)
}

/// Liveness probe: always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe: returns 200 when the application is ready to serve.
async fn readiness() -> &'static str {
    "ready"
}

async fn not_found() -> AppError {
    AppError::NotFound("no route matches this path".to_string())
}
