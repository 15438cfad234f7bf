//! 错误处理模块
//!
//! 定义网关中使用的错误类型：单次翻译尝试的失败、配置错误，以及最终返回给调用方的错误。

use serde::Serialize;
use thiserror::Error;

/// 翻译错误类型
///
/// 表示一次翻译尝试（一次对外部翻译服务的调用）的失败原因。
/// 这些错误由重试调度器内部吸收，只有在重试耗尽时才会以
/// [`GatewayError::ServiceUnavailable`] 的形式暴露给调用方。
///
/// # 变体说明
///
/// * `Http` - HTTP请求错误
/// * `Custom` - 自定义错误消息
/// * `ApiError` - API响应错误，包含错误代码和消息
/// * `ParseError` - 解析错误
/// * `EmptyResult` - 服务返回成功但译文为空
/// * `Timeout` - 请求截止时间已到
#[derive(Debug, Error)]
pub enum TranslationError {
    /// HTTP请求错误
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// 自定义错误消息
    #[error("{0}")]
    Custom(String),
    /// API响应错误
    #[error("API error {code}: {message}")]
    ApiError {
        /// 错误代码
        code: i32,
        /// 错误消息
        message: String,
    },
    /// 解析错误
    #[error("Parse error: {0}")]
    ParseError(String),
    /// 空译文
    #[error("Empty translation response")]
    EmptyResult,
    /// 截止时间已到
    #[error("Request deadline exceeded after {0} ms")]
    Timeout(u64),
}

impl From<String> for TranslationError {
    fn from(error: String) -> Self {
        TranslationError::Custom(error)
    }
}

impl From<&str> for TranslationError {
    fn from(error: &str) -> Self {
        TranslationError::Custom(error.to_string())
    }
}

/// 翻译结果类型别名
///
/// 简化返回类型，使用 `TranslationError` 作为错误类型。
///
/// # 示例
///
/// ```rust
/// use translate_gateway::{Result, TranslationError};
///
/// fn example_function() -> Result<String> {
///     Err(TranslationError::EmptyResult)
/// }
/// ```
pub type Result<T> = std::result::Result<T, TranslationError>;

/// 配置错误
///
/// 在启动阶段被视为致命错误。
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// 字段校验问题
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldProblem {
    Missing,
    WrongType,
    Empty,
    TooLong,
    UnsupportedLanguage,
}

/// 单个字段的校验失败
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: String,
    pub problem: FieldProblem,
}

impl FieldError {
    pub fn new(field: impl Into<String>, problem: FieldProblem) -> Self {
        Self {
            field: field.into(),
            problem,
        }
    }
}

/// 网关错误
///
/// 跨越网关边界、返回给调用方的错误。所有变体都不会被网关重试：
/// 是否重新发起被拒绝的请求由调用方决定。
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// 请求结构或字段无效
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        fields: Vec<FieldError>,
    },
    /// 超出速率限制
    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimited {
        retry_after_seconds: u64,
        limit: usize,
        window_seconds: u64,
    },
    /// 重试耗尽
    #[error("Translation failed after {attempts_used} attempts: {message}")]
    ServiceUnavailable { attempts_used: u32, message: String },
}

impl GatewayError {
    pub fn invalid(message: impl Into<String>, fields: Vec<FieldError>) -> Self {
        GatewayError::InvalidRequest {
            message: message.into(),
            fields,
        }
    }

    /// 机器可读的错误类别
    pub fn kind(&self) -> &'static str {
        match self {
            GatewayError::InvalidRequest { .. } => "InvalidRequest",
            GatewayError::RateLimited { .. } => "RateLimited",
            GatewayError::ServiceUnavailable { .. } => "ServiceUnavailable",
        }
    }
}
