//! # Translate Gateway
//!
//! 一个位于外部翻译服务之前的网关：接收翻译请求，进行速率限制，
//! 然后通过一组轮换的后端端点和客户端身份把请求转发给翻译服务。
//!
//! ## 主要特性
//!
//! - **速率限制**: 滑动窗口，支持全局键或按客户端地址分键
//! - **重试调度**: 失败后按递增（或固定）间隔加随机抖动重试
//! - **端点轮换**: 每次尝试随机抽取端点子集，第一个为主端点
//! - **请求校验**: 字段、语言代码与文本在准入之前校验
//! - **配置灵活**: 支持TOML配置文件和两种部署预设
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use translate_gateway::{GatewayConfig, HttpTranslationClient, Profile, RequestGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GatewayConfig::for_profile(Profile::PerClient);
//!     let client = Arc::new(HttpTranslationClient::new(config.pool.provider, Duration::from_secs(10)));
//!     let gateway = RequestGateway::from_config(&config, client)?;
//!
//!     let payload = serde_json::json!({"text": "Hello", "src": "en", "dest": "am"});
//!     let response = gateway.handle(&payload, None).await?;
//!     println!("Translation: {}", response.translated_text);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## 配置文件支持
//!
//! ```toml
//! [rate_limit]
//! max_calls = 300
//! window_seconds = 60
//! key = "client"
//!
//! [retry]
//! max_retries = 5
//! base_delay_ms = 1000
//! max_delay_ms = 5000
//! jitter_ms = 1000
//!
//! [pool]
//! provider = "deeplx"
//! sample_size = 1
//! endpoints = [{ address = "http://localhost:1188/translate", identity = "translate-gateway/0.1" }]
//! ```

pub mod catalog;
pub mod config;
pub mod dispatcher;
pub mod endpoint_pool;
pub mod error;
pub mod gateway;
pub mod rate_window;
pub mod server;
pub mod translator;
pub mod types;

pub use catalog::LanguageCatalog;
pub use config::{GatewayConfig, KeyScheme, Profile};
pub use dispatcher::{Attempt, AttemptOutcome, BackoffPolicy, DispatchOutcome, RetryDispatcher};
pub use endpoint_pool::{EndpointPool, EndpointSample};
pub use error::{ConfigError, FieldError, FieldProblem, GatewayError, Result, TranslationError};
pub use gateway::{RequestGateway, TranslateResponse};
pub use rate_window::{Admission, RateWindow};
pub use server::{create_router, serve, ServerError};
pub use translator::{HttpTranslationClient, Provider, TranslationClient};
pub use types::{EndpointDescriptor, RetryConfig, TranslationRequest, TranslationResult};
