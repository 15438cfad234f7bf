//! 端点轮换池
//!
//! 保存配置时确定的后端端点集合，并在每次尝试时随机抽取一个子集。

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::ConfigError;
use crate::types::EndpointDescriptor;

/// 端点轮换池
///
/// 有序、无重复，运行期间不可变，因此抽样无需加锁。
#[derive(Debug, Clone)]
pub struct EndpointPool {
    endpoints: Vec<EndpointDescriptor>,
}

/// 一次抽样得到的端点子集，第一个元素为主端点
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSample {
    endpoints: Vec<EndpointDescriptor>,
}

impl EndpointSample {
    /// 本次尝试使用的主端点
    pub fn primary(&self) -> &EndpointDescriptor {
        // 构造时保证非空
        &self.endpoints[0]
    }

    pub fn endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl EndpointPool {
    /// 创建端点池，空池或存在重复端点时返回配置错误
    pub fn new(endpoints: Vec<EndpointDescriptor>) -> Result<Self, ConfigError> {
        if endpoints.is_empty() {
            return Err(ConfigError::Invalid("endpoint pool is empty".to_string()));
        }

        let mut seen = HashSet::with_capacity(endpoints.len());
        for endpoint in &endpoints {
            if !seen.insert(endpoint) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate endpoint {} ({})",
                    endpoint.address, endpoint.identity
                )));
            }
        }

        Ok(Self { endpoints })
    }

    /// 由地址列表和身份列表轮流配对生成端点池
    ///
    /// 第 `i` 个地址使用第 `i % identities.len()` 个身份。
    pub fn from_rotation(addresses: &[&str], identities: &[&str]) -> Result<Self, ConfigError> {
        if identities.is_empty() {
            return Err(ConfigError::Invalid("identity list is empty".to_string()));
        }
        let endpoints = addresses
            .iter()
            .enumerate()
            .map(|(i, address)| EndpointDescriptor::new(*address, identities[i % identities.len()]))
            .collect();
        Self::new(endpoints)
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn endpoints(&self) -> &[EndpointDescriptor] {
        &self.endpoints
    }

    /// 检查抽样大小是否在 `1..=len` 范围内
    pub fn check_sample_size(&self, k: usize) -> Result<(), ConfigError> {
        if k == 0 || k > self.endpoints.len() {
            return Err(ConfigError::Invalid(format!(
                "sample size {} must be between 1 and the pool size {}",
                k,
                self.endpoints.len()
            )));
        }
        Ok(())
    }

    /// 无放回地均匀抽取 `k` 个不同端点
    ///
    /// 每次调用相互独立，不记忆之前的抽样结果。
    ///
    /// # 示例
    ///
    /// ```rust
    /// use rand::SeedableRng;
    /// use translate_gateway::EndpointPool;
    ///
    /// let pool = EndpointPool::from_rotation(&["a", "b", "c"], &["ua"]).unwrap();
    /// let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    /// let sample = pool.sample(2, &mut rng).unwrap();
    /// assert_eq!(sample.len(), 2);
    /// assert!(pool.sample(4, &mut rng).is_err());
    /// ```
    pub fn sample<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> Result<EndpointSample, ConfigError> {
        self.check_sample_size(k)?;
        Ok(self.draw(k, rng))
    }

    // 调用方需已通过 check_sample_size 校验 k
    pub(crate) fn draw<R: Rng + ?Sized>(&self, k: usize, rng: &mut R) -> EndpointSample {
        EndpointSample {
            endpoints: self.endpoints.choose_multiple(rng, k).cloned().collect(),
        }
    }
}
