//! 配置管理模块
//!
//! 提供TOML配置文件的读取、写入和自动发现功能，以及两种部署预设。

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::catalog::LanguageCatalog;
use crate::endpoint_pool::EndpointPool;
use crate::error::ConfigError;
use crate::translator::Provider;
use crate::types::{EndpointDescriptor, RetryConfig};

const GOOGLE_HOSTS: &[&str] = &[
    "translate.google.com",
    "translate.google.co.kr",
    "translate.google.de",
    "translate.google.fr",
    "translate.google.es",
    "translate.google.it",
    "translate.google.ru",
    "translate.google.com.br",
];

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/109.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/109.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 16_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 12; SM-S906N Build/QP1A.190711.020; wv) AppleWebKit/537.36 (KHTML, like Gecko) Version/4.0 Chrome/80.0.3987.119 Mobile Safari/537.36",
    "Mozilla/5.0 (iPad; CPU OS 16_2 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.1 Mobile/15E148 Safari/604.1",
];

/// 部署预设
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    /// 全局限流：10次/60秒，固定 en -> am，3 次固定间隔重试
    Global,
    /// 按客户端限流：300次/60秒，5 次递增间隔重试
    #[default]
    PerClient,
}

/// 速率限制的键方案
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyScheme {
    /// 所有调用共用一个键
    Global,
    /// 以客户端地址为键
    #[default]
    Client,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    /// 单个请求（含全部重试与等待）的总时限
    pub request_timeout_secs: u64,
    /// 单次调用外部服务的超时
    pub provider_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 5000,
            request_timeout_secs: 60,
            provider_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_calls: usize,
    pub window_seconds: u64,
    pub key: KeyScheme,
    pub cleanup_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_calls: 300,
            window_seconds: 60,
            key: KeyScheme::Client,
            cleanup_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub provider: Provider,
    pub sample_size: usize,
    pub endpoints: Vec<EndpointDescriptor>,
}

impl PoolConfig {
    /// 第 `i` 个主机固定使用第 `i % 6` 个身份
    fn rotation(hosts: &[&str], sample_size: usize) -> Self {
        let endpoints = hosts
            .iter()
            .enumerate()
            .map(|(i, host)| EndpointDescriptor::new(*host, USER_AGENTS[i % USER_AGENTS.len()]))
            .collect();
        Self {
            provider: Provider::Google,
            sample_size,
            endpoints,
        }
    }

    /// 每个主机与每个身份组合成一个端点，身份与主机独立抽取
    fn cross(hosts: &[&str], sample_size: usize) -> Self {
        let endpoints = hosts
            .iter()
            .flat_map(|host| {
                USER_AGENTS
                    .iter()
                    .map(move |agent| EndpointDescriptor::new(*host, *agent))
            })
            .collect();
        Self {
            provider: Provider::Google,
            sample_size,
            endpoints,
        }
    }
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self::cross(GOOGLE_HOSTS, 3)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageConfig {
    /// 固定的源语言，设置后忽略请求中的 `src`
    pub fixed_source: Option<String>,
    /// 固定的目标语言，设置后忽略请求中的 `dest`
    pub fixed_target: Option<String>,
    /// 覆盖内置语言目录
    pub supported: Option<Vec<String>>,
    pub max_text_length: usize,
}

impl Default for LanguageConfig {
    fn default() -> Self {
        Self {
            fixed_source: None,
            fixed_target: None,
            supported: None,
            max_text_length: 5000,
        }
    }
}

impl LanguageConfig {
    pub fn catalog(&self) -> LanguageCatalog {
        match &self.supported {
            Some(codes) => LanguageCatalog::from_codes(codes),
            None => LanguageCatalog::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    /// 允许的来源，`*` 表示任意来源
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: vec!["http://localhost:5173".to_string()],
        }
    }
}

/// 网关配置结构
///
/// 包含所有网关相关的配置选项，支持从TOML文件加载和保存。
///
/// # 示例
///
/// ```rust,no_run
/// use translate_gateway::{GatewayConfig, Profile};
///
/// // 从默认位置加载配置
/// let config = GatewayConfig::load_from_default_locations(Profile::PerClient);
///
/// // 从指定文件加载配置
/// let config = GatewayConfig::from_file("config.toml").unwrap();
///
/// // 保存配置到文件
/// config.save_to_file("output.toml").unwrap();
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    pub server: ServerConfig,
    pub rate_limit: RateLimitConfig,
    pub retry: RetryConfig,
    pub pool: PoolConfig,
    pub languages: LanguageConfig,
    pub cors: CorsConfig,
}

impl GatewayConfig {
    /// 指定部署预设的默认配置
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::PerClient => Self::default(),
            Profile::Global => Self {
                rate_limit: RateLimitConfig {
                    max_calls: 10,
                    window_seconds: 60,
                    key: KeyScheme::Global,
                    ..RateLimitConfig::default()
                },
                retry: RetryConfig::flat(3, 2000),
                pool: PoolConfig::rotation(&GOOGLE_HOSTS[..4], 4),
                languages: LanguageConfig {
                    fixed_source: Some("en".to_string()),
                    fixed_target: Some("am".to_string()),
                    ..LanguageConfig::default()
                },
                ..Self::default()
            },
        }
    }

    /// Load configuration from TOML file on top of the default profile
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        Self::from_file_with_profile(path, Profile::default())
    }

    /// Load configuration from TOML file on top of the given profile
    pub fn from_file_with_profile<P: AsRef<Path>>(path: P, profile: Profile) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content, profile)
    }

    /// 解析 TOML 内容，文件中未出现的键保留预设的值
    pub fn from_toml_str(content: &str, profile: Profile) -> Result<Self, ConfigError> {
        let overlay: toml::Value = toml::from_str(content)?;
        let mut merged = toml::Value::try_from(Self::for_profile(profile))?;
        merge_toml(&mut merged, overlay);
        Ok(merged.try_into()?)
    }

    /// Save configuration to TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Load configuration from multiple possible locations
    pub fn load_from_default_locations(profile: Profile) -> Self {
        let possible_paths = [
            "translate-gateway.toml",
            "config.toml",
            ".translate-gateway.toml",
        ];

        for path in &possible_paths {
            if Path::new(path).exists() {
                match Self::from_file_with_profile(path, profile) {
                    Ok(config) => {
                        tracing::info!("Loaded configuration from: {}", path);
                        return config;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", path, e);
                    }
                }
            }
        }

        tracing::info!("No configuration file found, using {:?} defaults", profile);
        Self::for_profile(profile)
    }

    /// Generate example configuration file
    pub fn generate_example_config<P: AsRef<Path>>(path: P, profile: Profile) -> Result<(), ConfigError> {
        Self::for_profile(profile).save_to_file(path)
    }

    pub fn endpoint_pool(&self) -> Result<EndpointPool, ConfigError> {
        EndpointPool::new(self.pool.endpoints.clone())
    }

    /// 校验配置，任何错误在启动时都是致命的
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |message: &str| Err(ConfigError::Invalid(message.to_string()));

        if self.rate_limit.max_calls == 0 {
            return invalid("rate_limit.max_calls must be at least 1");
        }
        if self.rate_limit.window_seconds == 0 {
            return invalid("rate_limit.window_seconds must be at least 1");
        }
        if self.rate_limit.cleanup_interval_secs == 0 {
            return invalid("rate_limit.cleanup_interval_secs must be at least 1");
        }
        if self.retry.max_retries == 0 {
            return invalid("retry.max_retries must be at least 1");
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return invalid("retry.base_delay_ms must not exceed retry.max_delay_ms");
        }
        if self.server.request_timeout_secs == 0 || self.server.provider_timeout_secs == 0 {
            return invalid("server timeouts must be at least 1 second");
        }
        if self.languages.max_text_length == 0 {
            return invalid("languages.max_text_length must be at least 1");
        }

        self.endpoint_pool()?.check_sample_size(self.pool.sample_size)?;

        let catalog = self.languages.catalog();
        if catalog.is_empty() {
            return invalid("languages.supported must not be empty");
        }
        for code in [&self.languages.fixed_source, &self.languages.fixed_target]
            .into_iter()
            .flatten()
        {
            if !catalog.contains(code) {
                return Err(ConfigError::Invalid(format!(
                    "fixed language {} is not in the supported catalog",
                    code
                )));
            }
        }

        Ok(())
    }
}

/// 表按键递归合并，其余值（包括数组）整体替换
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profiles_are_valid() {
        GatewayConfig::for_profile(Profile::Global).validate().unwrap();
        GatewayConfig::for_profile(Profile::PerClient).validate().unwrap();
    }

    #[test]
    fn test_global_profile_values() {
        let config = GatewayConfig::for_profile(Profile::Global);
        assert_eq!(config.rate_limit.max_calls, 10);
        assert_eq!(config.rate_limit.key, KeyScheme::Global);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.retry.base_delay_ms, config.retry.max_delay_ms);
        assert_eq!(config.pool.endpoints.len(), 4);
        assert_eq!(config.languages.fixed_target.as_deref(), Some("am"));
    }

    #[test]
    fn test_per_client_profile_values() {
        let config = GatewayConfig::for_profile(Profile::PerClient);
        assert_eq!(config.rate_limit.max_calls, 300);
        assert_eq!(config.rate_limit.key, KeyScheme::Client);
        assert_eq!(config.retry.max_retries, 5);
        assert_eq!(config.retry.max_delay_ms, 5000);
        assert_eq!(config.pool.endpoints.len(), 48);
        assert_eq!(config.pool.sample_size, 3);
    }

    #[test]
    fn test_per_client_pool_pairs_every_host_with_every_agent() {
        let config = GatewayConfig::for_profile(Profile::PerClient);
        for host in GOOGLE_HOSTS {
            let agents: Vec<_> = config
                .pool
                .endpoints
                .iter()
                .filter(|e| e.address == *host)
                .map(|e| e.identity.as_str())
                .collect();
            assert_eq!(agents, USER_AGENTS);
        }
        config.endpoint_pool().unwrap();
    }

    #[test]
    fn test_sample_size_beyond_pool_is_rejected() {
        let mut config = GatewayConfig::default();
        config.pool.sample_size = 49;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_unknown_fixed_language_is_rejected() {
        let mut config = GatewayConfig::for_profile(Profile::Global);
        config.languages.fixed_target = Some("tlh".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_inverted_backoff_bounds_are_rejected() {
        let mut config = GatewayConfig::default();
        config.retry.base_delay_ms = 6000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: GatewayConfig = toml::from_str(
            r#"
            [rate_limit]
            max_calls = 20
            key = "global"

            [pool]
            provider = "deeplx"
            sample_size = 1
            endpoints = [{ address = "http://localhost:1188/translate", identity = "gateway/1.0" }]
            "#,
        )
        .unwrap();

        assert_eq!(config.rate_limit.max_calls, 20);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.rate_limit.key, KeyScheme::Global);
        assert_eq!(config.pool.provider, Provider::DeepLX);
        assert_eq!(config.retry, RetryConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_file_values_override_selected_profile() {
        let config = GatewayConfig::from_toml_str("[server]\nport = 8080\n", Profile::Global).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.rate_limit.max_calls, 10);
        assert_eq!(config.rate_limit.key, KeyScheme::Global);
        assert_eq!(config.retry.max_retries, 3);
        assert_eq!(config.languages.fixed_source.as_deref(), Some("en"));
        assert_eq!(config.languages.fixed_target.as_deref(), Some("am"));
        assert_eq!(config.pool.endpoints.len(), 4);
    }

    #[test]
    fn test_partial_section_keeps_profile_keys() {
        let config = GatewayConfig::from_toml_str("[rate_limit]\nmax_calls = 20\n", Profile::Global).unwrap();

        assert_eq!(config.rate_limit.max_calls, 20);
        assert_eq!(config.rate_limit.key, KeyScheme::Global);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert_eq!(config.retry, RetryConfig::flat(3, 2000));
    }

    #[test]
    fn test_profile_file_is_read_with_profile() {
        let path = std::env::temp_dir().join(format!(
            "translate-gateway-profile-{}.toml",
            std::process::id()
        ));
        fs::write(&path, "[server]\nport = 8080\n").unwrap();

        let global = GatewayConfig::from_file_with_profile(&path, Profile::Global);
        let per_client = GatewayConfig::from_file(&path);
        let _ = fs::remove_file(&path);

        let global = global.unwrap();
        assert_eq!(global.server.port, 8080);
        assert_eq!(global.rate_limit.max_calls, 10);
        assert_eq!(per_client.unwrap().rate_limit.max_calls, 300);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let path = std::env::temp_dir().join(format!(
            "translate-gateway-test-{}.toml",
            std::process::id()
        ));
        let config = GatewayConfig::for_profile(Profile::Global);

        config.save_to_file(&path).unwrap();
        let loaded = GatewayConfig::from_file_with_profile(&path, Profile::Global).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded, config);
    }
}
