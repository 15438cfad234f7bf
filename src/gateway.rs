//! 请求网关
//!
//! 与传输层无关的请求处理流程，顺序固定为：
//!
//! 1. 校验请求结构、语言代码与文本
//! 2. 速率限制准入
//! 3. 调度翻译并整理响应
//!
//! 结构无效的请求不会占用速率限制额度，也不会触发任何翻译调用。

use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::catalog::LanguageCatalog;
use crate::config::{GatewayConfig, KeyScheme};
use crate::dispatcher::{DispatchOutcome, RetryDispatcher};
use crate::error::{ConfigError, FieldError, FieldProblem, GatewayError};
use crate::rate_window::{ceil_secs, Admission, RateWindow};
use crate::translator::TranslationClient;
use crate::types::TranslationRequest;

const GLOBAL_KEY: &str = "global";
const UNKNOWN_CLIENT_KEY: &str = "unknown";

const TEXT_FIELDS: &[&str] = &["text"];
const SOURCE_FIELDS: &[&str] = &["src", "source_language"];
const TARGET_FIELDS: &[&str] = &["dest", "destination_language"];

/// 翻译成功的响应
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TranslateResponse {
    pub original_text: String,
    pub translated_text: String,
    pub source_language: String,
    pub destination_language: String,
    pub confidence: Option<f64>,
    pub status: &'static str,
    pub attempts_used: u32,
    pub primary_endpoint_used: String,
}

/// 请求网关
pub struct RequestGateway {
    rate_window: Arc<RateWindow>,
    key_scheme: KeyScheme,
    dispatcher: RetryDispatcher,
    catalog: LanguageCatalog,
    fixed_source: Option<String>,
    fixed_target: Option<String>,
    max_text_length: usize,
}

impl RequestGateway {
    pub fn new(
        rate_window: Arc<RateWindow>,
        key_scheme: KeyScheme,
        dispatcher: RetryDispatcher,
        catalog: LanguageCatalog,
    ) -> Self {
        Self {
            rate_window,
            key_scheme,
            dispatcher,
            catalog,
            fixed_source: None,
            fixed_target: None,
            max_text_length: usize::MAX,
        }
    }

    /// 固定源语言和/或目标语言，对应字段不再从请求中读取
    pub fn with_fixed_languages(mut self, source: Option<String>, target: Option<String>) -> Self {
        self.fixed_source = source.map(|code| code.to_lowercase());
        self.fixed_target = target.map(|code| code.to_lowercase());
        self
    }

    pub fn with_max_text_length(mut self, max_text_length: usize) -> Self {
        self.max_text_length = max_text_length;
        self
    }

    /// 根据配置构建网关
    pub fn from_config(config: &GatewayConfig, client: Arc<dyn TranslationClient>) -> Result<Self, ConfigError> {
        config.validate()?;

        let rate_window = Arc::new(RateWindow::new(
            config.rate_limit.max_calls,
            Duration::from_secs(config.rate_limit.window_seconds),
        ));
        let dispatcher = RetryDispatcher::new(
            client,
            config.endpoint_pool()?,
            config.pool.sample_size,
            &config.retry,
        )?
        .with_deadline(Duration::from_secs(config.server.request_timeout_secs));

        Ok(Self::new(rate_window, config.rate_limit.key, dispatcher, config.languages.catalog())
            .with_fixed_languages(
                config.languages.fixed_source.clone(),
                config.languages.fixed_target.clone(),
            )
            .with_max_text_length(config.languages.max_text_length))
    }

    pub fn rate_window(&self) -> &Arc<RateWindow> {
        &self.rate_window
    }

    pub fn catalog(&self) -> &LanguageCatalog {
        &self.catalog
    }

    /// 处理一个请求
    pub async fn handle(&self, payload: &Value, client: Option<IpAddr>) -> Result<TranslateResponse, GatewayError> {
        let request = self.validate(payload)?;
        self.admit(client, Instant::now())?;
        self.dispatch(&request).await
    }

    /// 校验请求并构造 [`TranslationRequest`]
    ///
    /// 先检查字段是否存在及类型，再检查语言代码，最后检查文本内容。
    pub fn validate(&self, payload: &Value) -> Result<TranslationRequest, GatewayError> {
        let object = payload.as_object().ok_or_else(|| {
            GatewayError::invalid(
                "Request body must be a JSON object",
                vec![FieldError::new("body", FieldProblem::WrongType)],
            )
        })?;

        let mut problems = Vec::new();
        let text = string_field(object, TEXT_FIELDS, &mut problems);
        let source = match &self.fixed_source {
            Some(code) => Some(code.clone()),
            None => string_field(object, SOURCE_FIELDS, &mut problems).map(|code| code.trim().to_lowercase()),
        };
        let target = match &self.fixed_target {
            Some(code) => Some(code.clone()),
            None => string_field(object, TARGET_FIELDS, &mut problems).map(|code| code.trim().to_lowercase()),
        };

        let (text, source, target) = match (text, source, target) {
            (Some(text), Some(source), Some(target)) if problems.is_empty() => (text, source, target),
            _ => return Err(GatewayError::invalid("Missing or invalid parameters", problems)),
        };

        for (field, code) in [(SOURCE_FIELDS[0], &source), (TARGET_FIELDS[0], &target)] {
            if !self.catalog.contains(code) {
                problems.push(FieldError::new(field, FieldProblem::UnsupportedLanguage));
            }
        }
        if !problems.is_empty() {
            return Err(GatewayError::invalid("Invalid language code", problems));
        }

        if text.trim().chars().count() > self.max_text_length {
            return Err(GatewayError::invalid(
                format!("Text exceeds {} characters", self.max_text_length),
                vec![FieldError::new("text", FieldProblem::TooLong)],
            ));
        }

        TranslationRequest::new(text, source, target).ok_or_else(|| {
            GatewayError::invalid(
                "Text cannot be blank",
                vec![FieldError::new("text", FieldProblem::Empty)],
            )
        })
    }

    /// 速率限制准入
    pub fn admit(&self, client: Option<IpAddr>, now: Instant) -> Result<(), GatewayError> {
        let key = match self.key_scheme {
            KeyScheme::Global => GLOBAL_KEY.to_string(),
            KeyScheme::Client => client
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| UNKNOWN_CLIENT_KEY.to_string()),
        };

        match self.rate_window.allow(&key, now) {
            Admission::Admitted => Ok(()),
            rejected @ Admission::Rejected { .. } => {
                tracing::warn!("速率限制拒绝: {}", key);
                Err(GatewayError::RateLimited {
                    retry_after_seconds: rejected.retry_after_seconds(),
                    limit: self.rate_window.max_calls(),
                    window_seconds: ceil_secs(self.rate_window.window()),
                })
            }
        }
    }

    /// 调度翻译并整理响应
    pub async fn dispatch(&self, request: &TranslationRequest) -> Result<TranslateResponse, GatewayError> {
        match self.dispatcher.execute(request).await {
            DispatchOutcome::Succeeded {
                result,
                attempts_used,
                primary_endpoint,
                ..
            } => {
                tracing::info!(
                    "翻译完成: {} -> {}，尝试 {} 次，端点 {}",
                    request.source_lang(),
                    request.target_lang(),
                    attempts_used,
                    primary_endpoint.address
                );
                Ok(TranslateResponse {
                    original_text: request.text().to_string(),
                    translated_text: result.text,
                    source_language: result.source_lang,
                    destination_language: request.target_lang().to_string(),
                    confidence: result.confidence,
                    status: "success",
                    attempts_used,
                    primary_endpoint_used: primary_endpoint.address,
                })
            }
            DispatchOutcome::Exhausted {
                last_error,
                attempts_used,
                ..
            } => Err(GatewayError::ServiceUnavailable {
                attempts_used,
                message: last_error.to_string(),
            }),
        }
    }
}

/// 读取第一个存在的字段名，记录缺失或类型错误
fn string_field<'a>(
    object: &'a Map<String, Value>,
    names: &[&str],
    problems: &mut Vec<FieldError>,
) -> Option<&'a str> {
    match names.iter().find_map(|name| object.get(*name)) {
        Some(Value::String(value)) => Some(value),
        Some(_) => {
            problems.push(FieldError::new(names[0], FieldProblem::WrongType));
            None
        }
        None => {
            problems.push(FieldError::new(names[0], FieldProblem::Missing));
            None
        }
    }
}
