//! HTTP 服务模块
//!
//! 把 [`RequestGateway`] 暴露为 axum 路由，负责 CORS、错误到状态码的映射以及服务启动。

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::config::{CorsConfig, GatewayConfig};
use crate::error::{ConfigError, FieldError, FieldProblem, GatewayError};
use crate::gateway::RequestGateway;
use crate::translator::HttpTranslationClient;

/// 服务错误
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("server I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let message = self.to_string();
        match self {
            GatewayError::InvalidRequest { fields, .. } => (
                StatusCode::BAD_REQUEST,
                Json(json!({
                    "error": kind,
                    "message": message,
                    "fields": fields,
                })),
            )
                .into_response(),
            GatewayError::RateLimited {
                retry_after_seconds,
                limit,
                window_seconds,
            } => (
                StatusCode::TOO_MANY_REQUESTS,
                [(header::RETRY_AFTER, retry_after_seconds.to_string())],
                Json(json!({
                    "error": kind,
                    "message": message,
                    "retry_after_seconds": retry_after_seconds,
                    "limit": limit,
                    "window_seconds": window_seconds,
                })),
            )
                .into_response(),
            GatewayError::ServiceUnavailable { attempts_used, .. } => (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": kind,
                    "message": message,
                    "attempts_used": attempts_used,
                    "status": "failed",
                })),
            )
                .into_response(),
        }
    }
}

/// 翻译处理器
///
/// 请求体按原始字节读取，以便把格式错误的 JSON 也映射为 `InvalidRequest`。
pub async fn translate_handler(
    State(gateway): State<Arc<RequestGateway>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    body: Bytes,
) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::debug!("无法解析请求体: {}", e);
            return GatewayError::invalid(
                "Request body must be valid JSON",
                vec![FieldError::new("body", FieldProblem::WrongType)],
            )
            .into_response();
        }
    };

    let client = peer.map(|ConnectInfo(addr)| addr.ip());
    match gateway.handle(&payload, client).await {
        Ok(response) => Json(response).into_response(),
        Err(e) => {
            tracing::debug!("请求失败: {}", e);
            e.into_response()
        }
    }
}

/// 列出支持的语言
pub async fn languages_handler(State(gateway): State<Arc<RequestGateway>>) -> Json<Value> {
    Json(json!({ "languages": gateway.catalog().languages() }))
}

pub async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// 创建路由
pub fn create_router(gateway: Arc<RequestGateway>, cors: &CorsConfig) -> Router {
    Router::new()
        .route("/translate", post(translate_handler))
        .route("/api/translate", post(translate_handler))
        .route("/languages", get(languages_handler))
        .route("/health", get(health_handler))
        .with_state(gateway)
        .layer(cors_layer(cors))
}

/// 根据配置创建 CORS 层，`*` 表示允许任意来源
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);

    if config.allowed_origins.iter().any(|origin| origin == "*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!("忽略无效的 CORS 来源 {}: {}", origin, e);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// 启动 HTTP 服务，直到收到 Ctrl-C
pub async fn serve(config: GatewayConfig) -> Result<(), ServerError> {
    let client = Arc::new(HttpTranslationClient::new(
        config.pool.provider,
        Duration::from_secs(config.server.provider_timeout_secs),
    ));
    let gateway = Arc::new(RequestGateway::from_config(&config, client)?);

    let cleanup = Arc::clone(gateway.rate_window())
        .spawn_cleanup(Duration::from_secs(config.rate_limit.cleanup_interval_secs));

    let app = create_router(Arc::clone(&gateway), &config.cors);
    let addr = format!("{}:{}", config.server.bind_addr, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        "Translate gateway listening at http://{} ({} calls / {}s, key: {:?}, {} endpoints)",
        addr,
        config.rate_limit.max_calls,
        config.rate_limit.window_seconds,
        config.rate_limit.key,
        config.pool.endpoints.len()
    );

    let result = axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await;

    cleanup.abort();
    tracing::info!("Translate gateway stopped");
    result.map_err(ServerError::from)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("无法监听关闭信号: {}", e);
        std::future::pending::<()>().await;
    }
}
