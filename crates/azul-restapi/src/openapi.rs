//! # OpenAPI Specification Assembly
//!
//! Serves the utoipa-generated document at `{prefix}/openapi.json`. The
//! advertised security scheme follows the configured validator:
//!
//! | Mode          | Scheme                                                  |
//! |---------------|---------------------------------------------------------|
//! | `none`        | none                                                    |
//! | `oidc_modern` | `openIdConnect` pointing at the discovery URL           |
//! | `oidc_legacy` | `oauth2` authorization-code flow, endpoints from discovery |
//!
//! Legacy mode reads the discovery document through the shared trust cache
//! on request, so an unreachable IdP only fails this route (503) and never
//! blocks startup.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use azul_auth::{AuthError, OidcVerifier, TokenValidator};
use utoipa::openapi::security::{
    AuthorizationCode, Flow, OAuth2, OpenIdConnect, Scopes, SecurityRequirement, SecurityScheme,
};
use utoipa::openapi::{Components, Server};
use utoipa::OpenApi;

use crate::error::AppError;
use crate::state::AppState;

/// Name under which the security scheme is registered.
pub const SECURITY_SCHEME: &str = "oidc";

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Azul",
        description = "Azul REST API.",
        license(name = "MIT")
    ),
    paths(crate::routes::users::read_users_me),
    components(schemas(
        crate::routes::users::UserInfo,
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
    )),
    tags((name = "users", description = "Current user"))
)]
pub struct ApiDoc;

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}

/// GET /openapi.json: Return the generated OpenAPI specification.
async fn openapi_json(
    State(state): State<AppState>,
) -> Result<Json<utoipa::openapi::OpenApi>, AppError> {
    let mut doc = ApiDoc::openapi();

    let base = format!("{}{}", state.config.server.root_path(), state.config.server.api_prefix());
    doc.servers = Some(vec![Server::new(if base.is_empty() { "/".to_string() } else { base })]);

    let scopes = state.config.oidc.scope_list();
    let scheme = match state.validator.as_ref() {
        TokenValidator::NoAuth => None,
        TokenValidator::OidcModern(verifier) => Some(SecurityScheme::OpenIdConnect(
            OpenIdConnect::new(verifier.discovery_url()),
        )),
        TokenValidator::OidcLegacy(verifier) => Some(legacy_scheme(verifier, &scopes).await?),
    };

    if let Some(scheme) = scheme {
        doc.components
            .get_or_insert_with(Components::default)
            .add_security_scheme(SECURITY_SCHEME, scheme);
        doc.security = Some(vec![SecurityRequirement::new(SECURITY_SCHEME, scopes)]);
    }

    Ok(Json(doc))
}

async fn legacy_scheme(
    verifier: &OidcVerifier,
    scopes: &[&str],
) -> Result<SecurityScheme, AppError> {
    let discovery = verifier.discovery().await?;
    let authorization_url = discovery
        .authorization_endpoint()
        .map_err(AuthError::from)?
        .to_string();
    let token_url = discovery.token_endpoint().map_err(AuthError::from)?.to_string();

    let flow = AuthorizationCode::with_refresh_url(
        authorization_url,
        token_url.clone(),
        Scopes::from_iter(scopes.iter().map(|scope| (scope.to_string(), String::new()))),
        token_url,
    );
    Ok(SecurityScheme::OAuth2(OAuth2::new([Flow::AuthorizationCode(flow)])))
}
