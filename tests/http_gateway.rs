//! HTTP 网关集成测试
//!
//! 通过 axum 路由驱动完整流程：校验、限流、调度与响应格式。

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::extract::ConnectInfo;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use translate_gateway::{
    create_router, EndpointDescriptor, GatewayConfig, Profile, RequestGateway, Result,
    TranslationClient, TranslationError, TranslationResult,
};

/// 前 `failures` 次调用失败，之后返回固定译文
struct FlakyClient {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyClient {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationClient for FlakyClient {
    async fn translate(
        &self,
        _text: &str,
        source_lang: &str,
        _target_lang: &str,
        _endpoint: &EndpointDescriptor,
    ) -> Result<TranslationResult> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(TranslationError::Custom(format!("upstream refused call {}", call)));
        }
        Ok(TranslationResult {
            text: "ሰላም".to_string(),
            source_lang: source_lang.to_string(),
            confidence: Some(0.9),
        })
    }
}

fn fast_config(profile: Profile) -> GatewayConfig {
    let mut config = GatewayConfig::for_profile(profile);
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config.retry.jitter_ms = 0;
    config
}

fn app(config: &GatewayConfig, client: Arc<FlakyClient>) -> Router {
    let gateway = RequestGateway::from_config(config, client).unwrap();
    create_router(Arc::new(gateway), &config.cors)
}

fn post(body: Value, peer: [u8; 4]) -> Request<Body> {
    let mut request = Request::builder()
        .method(Method::POST)
        .uri("/translate")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    request
        .extensions_mut()
        .insert(ConnectInfo(SocketAddr::from((peer, 40000))));
    request
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_successful_translation_on_first_attempt() {
    let client = FlakyClient::new(0);
    let app = app(&fast_config(Profile::PerClient), client.clone());

    let (status, body) = send(
        &app,
        post(json!({"text": "Hello", "src": "en", "dest": "am"}), [127, 0, 0, 1]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["original_text"], "Hello");
    assert_eq!(body["translated_text"], "ሰላም");
    assert_eq!(body["destination_language"], "am");
    assert_eq!(body["attempts_used"], 1);
    assert_eq!(body["status"], "success");
    assert!(body["primary_endpoint_used"]
        .as_str()
        .unwrap()
        .starts_with("translate.google."));
    assert_eq!(client.calls(), 1);
}

#[tokio::test]
async fn test_retries_are_invisible_until_success() {
    let client = FlakyClient::new(2);
    let app = app(&fast_config(Profile::PerClient), client.clone());

    let (status, body) = send(
        &app,
        post(json!({"text": "Hello", "src": "en", "dest": "am"}), [127, 0, 0, 1]),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["attempts_used"], 3);
    assert_eq!(client.calls(), 3);
}

#[tokio::test]
async fn test_all_attempts_failing_returns_service_unavailable() {
    let client = FlakyClient::new(u32::MAX);
    let app = app(&fast_config(Profile::PerClient), client.clone());

    let (status, body) = send(
        &app,
        post(json!({"text": "Hello", "src": "en", "dest": "am"}), [127, 0, 0, 1]),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "ServiceUnavailable");
    assert_eq!(body["attempts_used"], 5);
    assert!(body["message"].as_str().unwrap().contains("upstream refused call 5"));
    assert_eq!(client.calls(), 5);
}

#[tokio::test]
async fn test_global_profile_limits_eleventh_call() {
    let client = FlakyClient::new(0);
    let app = app(&fast_config(Profile::Global), client.clone());

    for i in 0..10u8 {
        let (status, body) = send(&app, post(json!({"text": "Hello"}), [10, 0, 0, i])).await;
        assert_eq!(status, StatusCode::OK, "call {} failed: {}", i + 1, body);
        assert_eq!(body["source_language"], "en");
        assert_eq!(body["destination_language"], "am");
    }

    let response = app
        .clone()
        .oneshot(post(json!({"text": "Hello"}), [10, 0, 0, 200]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "60");

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "RateLimited");
    assert_eq!(body["retry_after_seconds"], 60);
    assert_eq!(body["limit"], 10);
    assert_eq!(client.calls(), 10);
}

#[tokio::test]
async fn test_per_client_limit_is_keyed_by_peer_address() {
    let client = FlakyClient::new(0);
    let mut config = fast_config(Profile::PerClient);
    config.rate_limit.max_calls = 2;
    let app = app(&config, client);
    let payload = json!({"text": "Hello", "src": "en", "dest": "am"});

    assert_eq!(send(&app, post(payload.clone(), [1, 1, 1, 1])).await.0, StatusCode::OK);
    assert_eq!(send(&app, post(payload.clone(), [1, 1, 1, 1])).await.0, StatusCode::OK);
    assert_eq!(
        send(&app, post(payload.clone(), [1, 1, 1, 1])).await.0,
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(send(&app, post(payload, [2, 2, 2, 2])).await.0, StatusCode::OK);
}

#[tokio::test]
async fn test_missing_text_is_rejected_without_side_effects() {
    let client = FlakyClient::new(0);
    let mut config = fast_config(Profile::PerClient);
    config.rate_limit.max_calls = 1;
    let app = app(&config, client.clone());

    let (status, body) = send(&app, post(json!({"src": "en", "dest": "am"}), [3, 3, 3, 3])).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidRequest");
    assert_eq!(body["fields"][0]["field"], "text");
    assert_eq!(body["fields"][0]["problem"], "missing");
    assert_eq!(client.calls(), 0);

    // 无效请求没有消耗唯一的额度
    let (status, _) = send(
        &app,
        post(json!({"text": "Hello", "src": "en", "dest": "am"}), [3, 3, 3, 3]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_whitespace_text_is_rejected_before_dispatch() {
    let client = FlakyClient::new(0);
    let app = app(&fast_config(Profile::PerClient), client.clone());

    let (status, body) = send(
        &app,
        post(json!({"text": "   ", "src": "en", "dest": "am"}), [4, 4, 4, 4]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["problem"], "empty");
    assert_eq!(client.calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_invalid_request() {
    let app = app(&fast_config(Profile::PerClient), FlakyClient::new(0));
    let mut request = post(json!({}), [5, 5, 5, 5]);
    *request.body_mut() = Body::from("{not json");

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "body");
}

#[tokio::test]
async fn test_cors_preflight_is_answered_without_rate_limiting() {
    let client = FlakyClient::new(0);
    let mut config = fast_config(Profile::PerClient);
    config.rate_limit.max_calls = 1;
    let app = app(&config, client);

    let preflight = Request::builder()
        .method(Method::OPTIONS)
        .uri("/translate")
        .header(header::ORIGIN, "http://localhost:5173")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "http://localhost:5173"
    );

    let (status, _) = send(
        &app,
        post(json!({"text": "Hello", "src": "en", "dest": "am"}), [6, 6, 6, 6]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_languages_endpoint_lists_catalog() {
    let app = app(&fast_config(Profile::PerClient), FlakyClient::new(0));
    let request = Request::builder()
        .uri("/languages")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["languages"]["am"], "amharic");
}
