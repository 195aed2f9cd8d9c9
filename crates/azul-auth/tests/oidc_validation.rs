//! End-to-end token validation against a mock identity provider.
//!
//! The IdP is a wiremock server publishing a discovery document and either a
//! bare shared secret or a JWKS. Tokens are minted with `jsonwebtoken`.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use azul_auth::{
    AuthError, CredentialFormat, HttpFetcher, OidcConfig, SecurityMode, TokenValidator, TrustCache,
    TrustError,
};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET: &[u8] = b"secret.secret.secret.secret.secret.secret.";
const SECRET_B64: &str = "c2VjcmV0LnNlY3JldC5zZWNyZXQuc2VjcmV0LnNlY3JldC5zZWNyZXQu";
const ROTATED: &[u8] = b"rotated.rotated.rotated.rotated.rotated.ro";
const ROTATED_B64: &str = "cm90YXRlZC5yb3RhdGVkLnJvdGF0ZWQucm90YXRlZC5yb3RhdGVkLnJv";
const REALM: &str = "/realms/azul";

// ── Harness ─────────────────────────────────────────────────────────

struct Idp {
    server: MockServer,
}

impl Idp {
    async fn start(keys: Value) -> Self {
        Self::start_with_algs(keys, json!("HS256")).await
    }

    async fn start_with_algs(keys: Value, algs: Value) -> Self {
        let server = MockServer::start().await;
        let base = format!("{}{REALM}", server.uri());
        Mock::given(method("GET"))
            .and(path(format!("{REALM}/.well-known/openid-configuration")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "issuer": base,
                "jwks_uri": format!("{base}/protocol/openid-connect/certs"),
                "authorization_endpoint": format!("{base}/protocol/openid-connect/auth"),
                "token_endpoint": format!("{base}/protocol/openid-connect/token"),
                "id_token_signing_alg_values_supported": algs,
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("{REALM}/protocol/openid-connect/certs")))
            .respond_with(ResponseTemplate::new(200).set_body_json(keys))
            .mount(&server)
            .await;
        Self { server }
    }

    fn issuer(&self) -> String {
        format!("{}{REALM}", self.server.uri())
    }

    fn validator(&self) -> TokenValidator {
        validator_for(&self.issuer())
    }
}

fn validator_for(authority_url: &str) -> TokenValidator {
    let config = OidcConfig {
        authority_url: authority_url.to_string(),
        client_id: "web".to_string(),
        http_timeout: Duration::from_secs(1),
        http_retries: 0,
        ..Default::default()
    };
    let fetcher = HttpFetcher::new(config.http_timeout, config.http_retries).unwrap();
    let cache = Arc::new(TrustCache::new(Arc::new(fetcher), config.cache_ttl));
    TokenValidator::from_config(SecurityMode::OidcModern, &config, cache)
}

fn now() -> i64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() as i64
}

fn llama_claims(issuer: &str) -> Value {
    json!({
        "sub": "llama-0001",
        "preferred_username": "llama",
        "email": "llama@example.org",
        "org": "paddock",
        "roles": ["test1", "test2", "/test3"],
        "aud": "web",
        "iss": issuer,
        "iat": now(),
        "exp": now() + 3600,
    })
}

fn sign(claims: &Value, key: &[u8]) -> String {
    encode(&Header::new(Algorithm::HS256), claims, &EncodingKey::from_secret(key)).unwrap()
}

fn sign_with_kid(claims: &Value, key: &[u8], kid: &str) -> String {
    let mut header = Header::new(Algorithm::HS256);
    header.kid = Some(kid.to_string());
    encode(&header, claims, &EncodingKey::from_secret(key)).unwrap()
}

fn bearer(token: &str) -> String {
    format!("Bearer {token}")
}

// ── Accepted tokens ─────────────────────────────────────────────────

#[tokio::test]
async fn valid_token_maps_to_identity() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let token = sign(&llama_claims(&idp.issuer()), SECRET);

    let identity = idp.validator().validate(Some(&bearer(&token))).await.unwrap();

    assert_eq!(identity.username(), "llama");
    assert_eq!(identity.organization(), "paddock");
    assert_eq!(identity.email(), "llama@example.org");
    assert_eq!(identity.roles(), ["test1", "test2", "test3"]);
    assert_eq!(identity.unique_id(), "llama-0001");
    assert_eq!(identity.raw_claims()["aud"], json!("web"));

    let cred = identity.credentials().unwrap();
    assert_eq!(cred.format(), CredentialFormat::Oauth);
    assert_eq!(cred.unique(), "llama-0001");
    assert_eq!(cred.token(), Some(token.as_str()));
}

#[tokio::test]
async fn scheme_prefix_is_optional() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let token = sign(&llama_claims(&idp.issuer()), SECRET);

    let identity = idp.validator().validate(Some(&token)).await.unwrap();
    assert_eq!(identity.username(), "llama");
}

#[tokio::test]
async fn jwks_key_selected_by_kid() {
    let idp = Idp::start(json!({
        "keys": [
            {"kty": "oct", "kid": "old", "k": SECRET_B64},
            {"kty": "oct", "kid": "new", "k": ROTATED_B64},
        ]
    }))
    .await;
    let validator = idp.validator();

    let token = sign_with_kid(&llama_claims(&idp.issuer()), ROTATED, "new");
    assert!(validator.validate(Some(&bearer(&token))).await.is_ok());

    // Right key material, wrong kid: the matching key fails the signature.
    let token = sign_with_kid(&llama_claims(&idp.issuer()), SECRET, "new");
    let err = validator.validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn token_without_kid_tries_every_key() {
    let idp = Idp::start(json!({
        "keys": [
            {"kty": "oct", "kid": "old", "k": SECRET_B64},
            {"kty": "oct", "kid": "new", "k": ROTATED_B64},
        ]
    }))
    .await;

    let token = sign(&llama_claims(&idp.issuer()), ROTATED);
    assert!(idp.validator().validate(Some(&bearer(&token))).await.is_ok());
}

#[tokio::test]
async fn trust_material_is_fetched_once_per_ttl() {
    let server = MockServer::start().await;
    let base = format!("{}{REALM}", server.uri());
    Mock::given(method("GET"))
        .and(path(format!("{REALM}/.well-known/openid-configuration")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": base,
            "jwks_uri": format!("{base}/certs"),
            "id_token_signing_alg_values_supported": ["HS256"],
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{REALM}/certs")))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!(std::str::from_utf8(SECRET).unwrap())),
        )
        .expect(1)
        .mount(&server)
        .await;

    let validator = validator_for(&base);
    let token = sign(&llama_claims(&base), SECRET);
    for _ in 0..5 {
        validator.validate(Some(&bearer(&token))).await.unwrap();
    }
    // `expect(1)` is verified when the server drops.
}

#[tokio::test]
async fn token_without_expiry_is_accepted() {
    let server = MockServer::start().await;
    let issuer = server.uri();
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": issuer,
            "jwks_uri": format!("{issuer}/keys"),
            "id_token_signing_alg_values_supported": ["HS256"],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/keys"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!("S")))
        .mount(&server)
        .await;

    let claims = json!({
        "sub": "llama",
        "preferred_username": "llama",
        "roles": ["test1", "test2", "test3"],
        "aud": "web",
        "iss": issuer,
    });
    let token = sign(&claims, b"S");

    let identity = validator_for(&issuer)
        .validate(Some(&bearer(&token)))
        .await
        .unwrap();
    assert_eq!(identity.username(), "llama");
    assert_eq!(identity.unique_id(), "llama");
    assert_eq!(identity.roles(), ["test1", "test2", "test3"]);
}

// ── Rejected tokens ─────────────────────────────────────────────────

async fn assert_rejected(claims: Value) {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let token = sign(&claims, SECRET);
    let err = idp.validator().validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed), "got: {err:?}");
}

#[tokio::test]
async fn expired_token_is_rejected() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let mut claims = llama_claims(&idp.issuer());
    claims["exp"] = json!(now() - 60);
    let token = sign(&claims, SECRET);
    let err = idp.validator().validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn not_yet_valid_token_is_rejected() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let mut claims = llama_claims(&idp.issuer());
    claims["nbf"] = json!(now() + 600);
    let token = sign(&claims, SECRET);
    let err = idp.validator().validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn wrong_audience_is_rejected() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let mut claims = llama_claims(&idp.issuer());
    claims["aud"] = json!("some-other-client");
    let token = sign(&claims, SECRET);
    let err = idp.validator().validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn wrong_issuer_is_rejected() {
    assert_rejected(llama_claims("https://evil.example/realms/azul")).await;
}

#[tokio::test]
async fn missing_subject_is_rejected() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let mut claims = llama_claims(&idp.issuer());
    claims.as_object_mut().unwrap().remove("sub");
    let token = sign(&claims, SECRET);
    let err = idp.validator().validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn bad_signature_is_rejected() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let token = sign(&llama_claims(&idp.issuer()), ROTATED);
    let err = idp.validator().validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn unadvertised_algorithm_is_rejected() {
    let idp =
        Idp::start_with_algs(json!(std::str::from_utf8(SECRET).unwrap()), json!(["RS256"])).await;
    let token = sign(&llama_claims(&idp.issuer()), SECRET);
    let err = idp.validator().validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn garbage_token_is_rejected() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let err = idp
        .validator()
        .validate(Some("Bearer not-a-jwt"))
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::AuthenticationFailed));
}

#[tokio::test]
async fn absent_header_is_missing_credential() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let err = idp.validator().validate(None).await.unwrap_err();
    assert!(matches!(err, AuthError::MissingCredential));
}

// ── Trust material failures ─────────────────────────────────────────

#[tokio::test]
async fn unreachable_idp_is_unavailable_not_unauthenticated() {
    // Port 1 is closed: connection refused.
    let validator = validator_for("http://127.0.0.1:1/realms/azul");
    let token = sign(&llama_claims("http://127.0.0.1:1/realms/azul"), SECRET);

    let err = validator.validate(Some(&bearer(&token))).await.unwrap_err();
    assert!(
        matches!(err, AuthError::TrustMaterialUnavailable(TrustError::Http { .. })),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn idp_error_status_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let base = format!("{}{REALM}", server.uri());
    let token = sign(&llama_claims(&base), SECRET);

    let err = validator_for(&base)
        .validate(Some(&bearer(&token)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AuthError::TrustMaterialUnavailable(TrustError::Status { status: 502, .. })
    ));
}

#[tokio::test]
async fn legacy_mode_exposes_discovery_endpoints() {
    let idp = Idp::start(json!(std::str::from_utf8(SECRET).unwrap())).await;
    let config = OidcConfig {
        authority_url: idp.issuer(),
        http_retries: 0,
        ..Default::default()
    };
    let fetcher = HttpFetcher::new(config.http_timeout, 0).unwrap();
    let cache = Arc::new(TrustCache::new(Arc::new(fetcher), config.cache_ttl));
    let validator = TokenValidator::from_config(SecurityMode::OidcLegacy, &config, cache);

    let doc = validator.verifier().unwrap().discovery().await.unwrap();
    assert_eq!(
        doc.authorization_endpoint().unwrap(),
        format!("{}/protocol/openid-connect/auth", idp.issuer())
    );
    assert_eq!(
        doc.token_endpoint().unwrap(),
        format!("{}/protocol/openid-connect/token", idp.issuer())
    );
}
