//! CORS layer from [`CorsConfig`].
//!
//! `*` in any list means "anything". Combined with credentials, a wildcard
//! is answered by mirroring the request instead, because browsers reject a
//! literal `*` on credentialed responses.

use axum::http::{HeaderName, HeaderValue, Method};
use tower_http::cors::{AllowHeaders, AllowMethods, AllowOrigin, CorsLayer};

use crate::config::CorsConfig;

const WILDCARD: &str = "*";

/// `None` when no origin is configured.
pub fn layer(config: &CorsConfig) -> Option<CorsLayer> {
    if !config.is_enabled() {
        return None;
    }
    let credentials = config.allow_credentials;

    let origins = if has_wildcard(&config.allow_origins) {
        if credentials {
            AllowOrigin::mirror_request()
        } else {
            AllowOrigin::any()
        }
    } else {
        AllowOrigin::list(parse_all(&config.allow_origins, "origin", |s| {
            HeaderValue::from_str(s).ok()
        }))
    };

    let methods = if has_wildcard(&config.allow_methods) {
        if credentials {
            AllowMethods::mirror_request()
        } else {
            AllowMethods::any()
        }
    } else {
        AllowMethods::list(parse_all(&config.allow_methods, "method", |s| {
            Method::from_bytes(s.to_ascii_uppercase().as_bytes()).ok()
        }))
    };

    let headers = if has_wildcard(&config.allow_headers) {
        if credentials {
            AllowHeaders::mirror_request()
        } else {
            AllowHeaders::any()
        }
    } else {
        AllowHeaders::list(parse_all(&config.allow_headers, "header", |s| {
            HeaderName::from_bytes(s.as_bytes()).ok()
        }))
    };

    Some(
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(methods)
            .allow_headers(headers)
            .allow_credentials(credentials),
    )
}

fn has_wildcard(values: &[String]) -> bool {
    values.iter().any(|v| v == WILDCARD)
}

fn parse_all<T>(values: &[String], kind: &str, parse: impl Fn(&str) -> Option<T>) -> Vec<T> {
    values
        .iter()
        .filter_map(|raw| {
            let parsed = parse(raw.trim());
            if parsed.is_none() {
                tracing::warn!(value = %raw, kind, "ignoring invalid CORS entry");
            }
            parsed
        })
        .collect()
}
