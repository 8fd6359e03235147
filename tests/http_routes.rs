use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use openid_token_store::config::{Config, DEFAULT_TOKEN_LIFETIME_MS};
use openid_token_store::store::{
    MemoryTokenRepository, NewOpenIdToken, OpenIdTokenStore, ServerName,
};
use openid_token_store::{api, AppState};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

const SECRET: &str = "internal-test-secret";

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "memory".into(),
        database_max_connections: 1,
        server_name: "example.org".into(),
        auth_service_secret: SECRET.into(),
        openid_token_lifetime_ms: DEFAULT_TOKEN_LIFETIME_MS,
    }
}

async fn test_state() -> Arc<AppState<MemoryTokenRepository>> {
    test_state_with(test_config()).await
}

async fn test_state_with(config: Config) -> Arc<AppState<MemoryTokenRepository>> {
    let store = OpenIdTokenStore::new(
        MemoryTokenRepository::new(),
        ServerName::new("example.org").unwrap(),
    )
    .await
    .unwrap();

    Arc::new(AppState {
        config,
        store,
    })
}

fn test_router(state: Arc<AppState<MemoryTokenRepository>>) -> Router {
    api::router(state)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn request_token(user_id: &str, secret: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!(
            "/_matrix/client/v3/user/{user_id}/openid/request_token"
        ))
        .header("content-type", "application/json");
    if let Some(secret) = secret {
        builder = builder.header("x-internal-secret", secret);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn userinfo(token: &str) -> Request<Body> {
    Request::builder()
        .uri(format!(
            "/_matrix/federation/v1/openid/userinfo?access_token={token}"
        ))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_status_endpoint() {
    let app = test_router(test_state().await);

    let response = app
        .oneshot(Request::builder().uri("/v1/status").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_request_token_then_userinfo() {
    let state = test_state().await;

    let response = test_router(state.clone())
        .oneshot(request_token("@alice:example.org", Some(SECRET), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["token_type"], "Bearer");
    assert_eq!(body["matrix_server_name"], "example.org");
    assert_eq!(body["expires_in"], 3600);
    let token = body["access_token"].as_str().unwrap().to_string();

    let stored = state.store.lookup(&token).await.unwrap();
    assert_eq!(stored.user_id, "@alice:example.org");
    assert!(stored.relying_party.is_none());
    assert_eq!(
        stored.expires_at_ms - stored.created_at_ms,
        DEFAULT_TOKEN_LIFETIME_MS
    );

    let response = test_router(state)
        .oneshot(userinfo(&token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["sub"], "@alice:example.org");
}

#[tokio::test]
async fn test_request_token_records_relying_party() {
    let state = test_state().await;

    let response = test_router(state.clone())
        .oneshot(request_token(
            "@alice:example.org",
            Some(SECRET),
            r#"{"relying_party":"https://id.example.com"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let token = body_json(response).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();
    let stored = state.store.lookup(&token).await.unwrap();
    assert_eq!(stored.relying_party.as_deref(), Some("https://id.example.com"));
}

#[tokio::test]
async fn test_request_token_requires_internal_secret() {
    let state = test_state().await;

    let response = test_router(state.clone())
        .oneshot(request_token("@alice:example.org", None, "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = test_router(state.clone())
        .oneshot(request_token("@alice:example.org", Some("wrong"), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(state.store.repository().is_empty().unwrap());
}

#[tokio::test]
async fn test_request_token_rejects_remote_user() {
    let state = test_state().await;

    let response = test_router(state.clone())
        .oneshot(request_token("@alice:elsewhere.org", Some(SECRET), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["errcode"], "M_FORBIDDEN");
    assert!(state.store.repository().is_empty().unwrap());
}

#[tokio::test]
async fn test_request_token_overflowing_lifetime_is_an_error() {
    let mut config = test_config();
    config.openid_token_lifetime_ms = i64::MAX;
    let state = test_state_with(config).await;

    let response = test_router(state.clone())
        .oneshot(request_token("@alice:example.org", Some(SECRET), "{}"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_json(response).await["errcode"], "M_UNKNOWN");
    assert!(state.store.repository().is_empty().unwrap());
}

#[tokio::test]
async fn test_request_token_rejects_bad_json() {
    let response = test_router(test_state().await)
        .oneshot(request_token("@alice:example.org", Some(SECRET), "{not json"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_userinfo_unknown_token() {
    let response = test_router(test_state().await)
        .oneshot(userinfo("never-issued"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errcode"], "M_UNKNOWN_TOKEN");
}

#[tokio::test]
async fn test_userinfo_missing_token() {
    let response = test_router(test_state().await)
        .oneshot(
            Request::builder()
                .uri("/_matrix/federation/v1/openid/userinfo")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errcode"], "M_MISSING_TOKEN");
}

#[tokio::test]
async fn test_userinfo_rejects_expired_token() {
    let state = test_state().await;
    state
        .store
        .issue(NewOpenIdToken {
            token: "stale".into(),
            localpart: "alice".into(),
            created_at_ms: 1000,
            expires_at_ms: 601_000,
            relying_party: None,
        })
        .await
        .unwrap();

    // The store itself still reports the record.
    assert_eq!(state.store.lookup("stale").await.unwrap().expires_at_ms, 601_000);

    let response = test_router(state).oneshot(userinfo("stale")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["errcode"], "M_UNKNOWN_TOKEN");
}

#[tokio::test]
async fn test_userinfo_storage_outage() {
    let state = test_state().await;
    state.store.repository().set_unavailable(true);

    let response = test_router(state).oneshot(userinfo("any")).await.unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["error"], "Internal server error");
}
