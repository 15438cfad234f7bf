//! 类型定义模块
//!
//! 定义网关中使用的数据结构：翻译请求与结果、后端端点描述和重试配置。

use serde::{Deserialize, Serialize};

/// 后端端点描述
///
/// 由服务地址和客户端身份（以 `User-Agent` 发送）组成，
/// 用于改变后端所看到的调用方。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EndpointDescriptor {
    /// 服务地址，可以是主机名或完整URL
    pub address: String,
    /// 客户端身份标识
    pub identity: String,
}

impl EndpointDescriptor {
    pub fn new(address: impl Into<String>, identity: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            identity: identity.into(),
        }
    }
}

/// 翻译请求
///
/// 构造后不可变。文本在构造时去除首尾空白，且不能为空。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationRequest {
    text: String,
    source_lang: String,
    target_lang: String,
}

impl TranslationRequest {
    /// 创建翻译请求
    ///
    /// 文本去除首尾空白后为空时返回 `None`。
    ///
    /// # 示例
    ///
    /// ```rust
    /// use translate_gateway::TranslationRequest;
    ///
    /// let request = TranslationRequest::new("  Hello ", "en", "am").unwrap();
    /// assert_eq!(request.text(), "Hello");
    /// assert!(TranslationRequest::new("   ", "en", "am").is_none());
    /// ```
    pub fn new(
        text: &str,
        source_lang: impl Into<String>,
        target_lang: impl Into<String>,
    ) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        Some(Self {
            text: text.to_string(),
            source_lang: source_lang.into(),
            target_lang: target_lang.into(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn source_lang(&self) -> &str {
        &self.source_lang
    }

    pub fn target_lang(&self) -> &str {
        &self.target_lang
    }
}

/// 翻译结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationResult {
    /// 译文
    pub text: String,
    /// 检测到或声明的源语言
    pub source_lang: String,
    /// 服务给出的置信度
    pub confidence: Option<f64>,
}

/// 重试配置
///
/// 第 `n` 次失败后的等待时间为
/// `min(base_delay_ms * n, max_delay_ms) + jitter`，
/// 其中 `jitter` 在 `[0, jitter_ms)` 内均匀分布。
/// 当 `base_delay_ms == max_delay_ms` 时即为固定间隔。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
}

impl RetryConfig {
    /// 固定间隔重试
    pub fn flat(max_retries: u32, delay_ms: u64) -> Self {
        Self {
            max_retries,
            base_delay_ms: delay_ms,
            max_delay_ms: delay_ms,
            jitter_ms: 1000,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 1000,
            max_delay_ms: 5000,
            jitter_ms: 1000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeepLXRequest {
    pub text: String,
    pub source_lang: String,
    pub target_lang: String,
}

#[derive(Debug, Deserialize)]
pub struct DeepLXResponse {
    pub code: i32,
    pub data: String,
    #[serde(default)]
    pub source_lang: Option<String>,
}
