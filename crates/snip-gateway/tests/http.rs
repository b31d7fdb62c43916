use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use jiff::{SignedDuration, Timestamp};
use snip_cache::LruCache;
use snip_core::{ShortCode, ShortenParams, Shortener, ShortenerError, StorageError};
use snip_gateway::model::ShortenResponse;
use snip_gateway::{App, AppState};
use snip_generator::RandomGenerator;
use snip_shortener::ShortenerService;
use snip_storage::InMemoryRepository;
use tower::ServiceExt;

const BASE_URL: &str = "https://sn.ip";

fn router() -> Router {
    let service = ShortenerService::new(
        Arc::new(InMemoryRepository::new()),
        RandomGenerator::default(),
        Arc::new(LruCache::new(1_000)),
    );
    App::router(AppState::new(Arc::new(service)).with_base_url(BASE_URL))
}

fn shorten_request(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/shorten")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::HOST, "localhost:8384")
        .body(body.into())
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn shorten(app: &Router, body: serde_json::Value) -> String {
    let response = app
        .clone()
        .oneshot(shorten_request(body.to_string()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let body: ShortenResponse = serde_json::from_str(&body_string(response).await).unwrap();
    body.short_url
}

fn code_of(short_url: &str) -> &str {
    short_url.rsplit('/').next().unwrap()
}

#[tokio::test]
async fn shorten_then_redirect() {
    let app = router();

    let short_url = shorten(&app, serde_json::json!({ "url": "https://example.com/a?b=c" })).await;
    assert!(short_url.starts_with("https://sn.ip/"), "{short_url}");
    let code = code_of(&short_url);
    assert_eq!(code.len(), 8);

    let response = app.clone().oneshot(get(&format!("/{code}"))).await.unwrap();

    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
    assert_eq!(
        response.headers()[header::LOCATION],
        "https://example.com/a?b=c"
    );
}

#[tokio::test]
async fn short_url_base_defaults_to_host_header() {
    let service = ShortenerService::new(
        Arc::new(InMemoryRepository::new()),
        RandomGenerator::default(),
        Arc::new(LruCache::new(16)),
    );
    let app = App::router(AppState::new(Arc::new(service)));

    let short_url = shorten(&app, serde_json::json!({ "url": "https://example.com" })).await;

    assert!(short_url.starts_with("http://localhost:8384/"), "{short_url}");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = router();

    for body in [
        "not json",
        r#"{"link": "https://example.com"}"#,
        r#"{"url": ""}"#,
        r#"{"url": "   "}"#,
        r#"{"url": "https://example.com", "expire_at": "tomorrow"}"#,
    ] {
        let response = app.clone().oneshot(shorten_request(body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{body}");
    }
}

#[tokio::test]
async fn past_expiry_is_bad_request() {
    let app = router();
    let past = Timestamp::now() - SignedDuration::from_hours(1);

    let response = app
        .oneshot(shorten_request(
            serde_json::json!({ "url": "https://example.com", "expire_at": past.to_string() })
                .to_string(),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn expired_link_stops_redirecting() {
    let app = router();
    let soon = Timestamp::now() + SignedDuration::from_millis(300);

    let short_url = shorten(
        &app,
        serde_json::json!({ "url": "https://example.com", "expire_at": soon.to_string() }),
    )
    .await;
    let uri = format!("/{}", code_of(&short_url));

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let response = app.clone().oneshot(get(&uri)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_or_malformed_code_is_not_found() {
    let app = router();

    for uri in ["/unknown1", "/bad.code", "/a/b", "/"] {
        let response = app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
    }
}

#[tokio::test]
async fn health_reports_ok() {
    let response = router().oneshot(get("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body, serde_json::json!({ "status": "ok" }));
}

struct FailingShortener;

#[async_trait]
impl Shortener for FailingShortener {
    async fn shorten(&self, _params: ShortenParams) -> Result<ShortCode, ShortenerError> {
        Err(ShortenerError::Exhausted {
            attempts: 5,
            source: StorageError::Conflict("abc".to_string()),
        })
    }

    async fn resolve(&self, _code: &ShortCode) -> Result<String, ShortenerError> {
        Err(ShortenerError::Storage(StorageError::Unavailable(
            "disk gone".to_string(),
        )))
    }
}

#[tokio::test]
async fn service_failures_are_opaque_500s() {
    let app = App::router(AppState::new(Arc::new(FailingShortener)).with_base_url(BASE_URL));

    let response = app
        .clone()
        .oneshot(shorten_request(r#"{"url": "https://example.com"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "internal error");

    let response = app.oneshot(get("/abc123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body_string(response).await, "internal error");
}
