//! 翻译服务客户端模块
//!
//! 定义外部翻译服务的抽象接口，以及基于 HTTP 的实现。
//! 网关本身不关心文本如何被翻译，只通过 [`TranslationClient`] 调用。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, TranslationError};
use crate::types::{DeepLXRequest, DeepLXResponse, EndpointDescriptor, TranslationResult};

/// 外部翻译服务接口
///
/// 实现方可以返回成功但译文为空的结果，调度器会把它当作失败处理。
#[async_trait]
pub trait TranslationClient: Send + Sync {
    /// 使用指定端点翻译文本
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        endpoint: &EndpointDescriptor,
    ) -> Result<TranslationResult>;
}

/// 后端协议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// Google 网页翻译的 `gtx` 接口
    #[default]
    Google,
    /// DeepLX 兼容接口
    DeepLX,
}

/// 基于 HTTP 的翻译客户端
///
/// 端点的 `identity` 作为 `User-Agent` 发送。
///
/// # 示例
///
/// ```rust
/// use std::time::Duration;
/// use translate_gateway::{HttpTranslationClient, Provider};
///
/// let client = HttpTranslationClient::new(Provider::Google, Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct HttpTranslationClient {
    /// HTTP客户端，用于API调用
    client: Client,
    provider: Provider,
}

impl HttpTranslationClient {
    /// 创建新的翻译客户端
    ///
    /// # 参数
    ///
    /// * `provider` - 后端协议
    /// * `timeout` - 单次调用的超时时间
    pub fn new(provider: Provider, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(5)
            .tcp_keepalive(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to create optimized client: {}, using default", e);
                Client::new()
            });

        Self { client, provider }
    }

    pub fn provider(&self) -> Provider {
        self.provider
    }

    async fn translate_google(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        endpoint: &EndpointDescriptor,
    ) -> Result<TranslationResult> {
        let base = endpoint_url(&endpoint.address, "https", "/translate_a/single");
        let url = Url::parse_with_params(
            &base,
            &[
                ("client", "gtx"),
                ("sl", source_lang),
                ("tl", target_lang),
                ("dt", "t"),
                ("q", text),
            ],
        )
        .map_err(|e| TranslationError::Custom(format!("无效的端点地址 {}: {}", base, e)))?;

        tracing::debug!("发送翻译请求到: {}", endpoint.address);

        let response = self
            .client
            .get(url)
            .header("User-Agent", &endpoint.identity)
            .header("Accept", "application/json, text/plain, */*")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            return Err(TranslationError::ApiError {
                code: i32::from(status.as_u16()),
                message: format!("翻译服务请求失败: {} - {}", status, error_text),
            });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| TranslationError::ParseError(format!("无法解析JSON响应: {}", e)))?;
        parse_google_response(&body, source_lang)
    }

    async fn translate_deeplx(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        endpoint: &EndpointDescriptor,
    ) -> Result<TranslationResult> {
        let url = endpoint_url(&endpoint.address, "http", "");
        let request = DeepLXRequest {
            text: text.to_string(),
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        };

        tracing::debug!("发送翻译请求到: {}", url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .header("User-Agent", &endpoint.identity)
            .json(&request)
            .send()
            .await
            .map_err(|e| TranslationError::Custom(format!("DeepLX网络请求失败: {}", e)))?;

        let status = response.status();
        tracing::debug!("DeepLX响应状态: {}", status);

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            return Err(TranslationError::ApiError {
                code: i32::from(status.as_u16()),
                message: format!("DeepLX API请求失败: {} - {}", status, error_text),
            });
        }

        let response_text = response
            .text()
            .await
            .map_err(|e| TranslationError::Custom(format!("读取响应文本失败: {}", e)))?;
        parse_deeplx_response(&response_text, source_lang)
    }
}

#[async_trait]
impl TranslationClient for HttpTranslationClient {
    async fn translate(
        &self,
        text: &str,
        source_lang: &str,
        target_lang: &str,
        endpoint: &EndpointDescriptor,
    ) -> Result<TranslationResult> {
        match self.provider {
            Provider::Google => {
                self.translate_google(text, source_lang, target_lang, endpoint)
                    .await
            }
            Provider::DeepLX => {
                self.translate_deeplx(text, source_lang, target_lang, endpoint)
                    .await
            }
        }
    }
}

/// 地址没有协议前缀时补上 `scheme`，没有以 `path` 结尾时补上 `path`
fn endpoint_url(address: &str, scheme: &str, path: &str) -> String {
    let address = address.trim_end_matches('/');
    let base = if address.starts_with("http://") || address.starts_with("https://") {
        address.to_string()
    } else {
        format!("{}://{}", scheme, address)
    };
    if base.ends_with(path) {
        base
    } else {
        base + path
    }
}

/// 解析 `gtx` 接口的嵌套数组响应
///
/// 译文为 `data[0][i][0]` 的拼接，源语言为 `data[2]`，置信度为 `data[6]`。
pub fn parse_google_response(body: &Value, requested_source: &str) -> Result<TranslationResult> {
    let sentences = body
        .get(0)
        .and_then(Value::as_array)
        .ok_or_else(|| TranslationError::ParseError(format!("无法从响应中提取翻译结果: {}", body)))?;

    let text: String = sentences
        .iter()
        .filter_map(|sentence| sentence.get(0).and_then(Value::as_str))
        .collect();

    let source_lang = body
        .get(2)
        .and_then(Value::as_str)
        .unwrap_or(requested_source)
        .to_string();

    Ok(TranslationResult {
        text,
        source_lang,
        confidence: body.get(6).and_then(Value::as_f64),
    })
}

#[derive(Debug, Deserialize)]
struct LooseSourceLang {
    #[serde(default, alias = "src", alias = "detected_source_language")]
    source_lang: Option<String>,
}

/// 解析 DeepLX 及其兼容服务的响应
///
/// 依次尝试标准 `{code, data}` 格式、常见字段名的 JSON 对象以及纯文本。
pub fn parse_deeplx_response(response_text: &str, requested_source: &str) -> Result<TranslationResult> {
    if let Ok(result) = serde_json::from_str::<DeepLXResponse>(response_text) {
        if result.code != 200 {
            return Err(TranslationError::ApiError {
                code: result.code,
                message: format!("DeepLX翻译失败，返回代码: {}", result.code),
            });
        }
        return Ok(TranslationResult {
            text: result.data,
            source_lang: result
                .source_lang
                .map(|lang| lang.to_lowercase())
                .unwrap_or_else(|| requested_source.to_string()),
            confidence: None,
        });
    }

    let trimmed = response_text.trim();
    if trimmed.starts_with('{') {
        let json_value: Value = serde_json::from_str(trimmed)
            .map_err(|_| TranslationError::ParseError(format!("无法解析JSON响应: {}", response_text)))?;
        let translated = json_value
            .get("translated_text")
            .or_else(|| json_value.get("result"))
            .or_else(|| json_value.get("translation"))
            .or_else(|| json_value.get("data"))
            .and_then(Value::as_str)
            .ok_or_else(|| {
                TranslationError::ParseError(format!("无法从JSON响应中提取翻译结果: {}", response_text))
            })?;
        let source_lang = serde_json::from_value::<LooseSourceLang>(json_value.clone())
            .ok()
            .and_then(|loose| loose.source_lang)
            .unwrap_or_else(|| requested_source.to_string());
        return Ok(TranslationResult {
            text: translated.to_string(),
            source_lang,
            confidence: json_value.get("confidence").and_then(Value::as_f64),
        });
    }

    // 纯文本响应，空文本交由调度器判定
    Ok(TranslationResult {
        text: trimmed.to_string(),
        source_lang: requested_source.to_string(),
        confidence: None,
    })
}
