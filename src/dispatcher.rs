//! 重试调度模块
//!
//! 对每个请求依次执行翻译尝试：每次从端点池抽样，调用外部翻译服务，
//! 失败时按退避策略等待后重试，直到成功或重试次数耗尽。

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::time::{sleep_until, timeout_at, Instant};

use crate::endpoint_pool::{EndpointPool, EndpointSample};
use crate::error::{ConfigError, TranslationError};
use crate::translator::TranslationClient;
use crate::types::{EndpointDescriptor, RetryConfig, TranslationRequest, TranslationResult};

/// 退避策略
///
/// 第 `n` 次失败后的等待时间为 `min(base * n, cap) + jitter`。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base: Duration,
    cap: Duration,
    jitter: Duration,
}

impl BackoffPolicy {
    pub fn new(base: Duration, cap: Duration, jitter: Duration) -> Self {
        Self { base, cap, jitter }
    }

    pub fn from_config(config: &RetryConfig) -> Self {
        Self::new(
            Duration::from_millis(config.base_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(config.jitter_ms),
        )
    }

    /// 不含抖动的等待时间，`attempt` 从 1 开始
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.base.saturating_mul(attempt).min(self.cap)
    }

    /// 含抖动的等待时间，抖动在 `[0, jitter)` 内均匀分布
    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        let jitter = if self.jitter.is_zero() {
            Duration::ZERO
        } else {
            self.jitter.mul_f64(rng.gen::<f64>())
        };
        self.base_delay(attempt) + jitter
    }
}

/// 单次尝试的结果
#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Succeeded,
    Failed(String),
}

/// 单次尝试记录
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    /// 尝试序号，从 1 开始
    pub index: u32,
    /// 本次抽样的端点
    pub endpoints: EndpointSample,
    pub outcome: AttemptOutcome,
    /// 本次失败后等待的时间，最后一次尝试为 `None`
    pub backoff: Option<Duration>,
}

/// 调度结果
#[derive(Debug)]
pub enum DispatchOutcome {
    Succeeded {
        result: TranslationResult,
        attempts_used: u32,
        primary_endpoint: EndpointDescriptor,
        history: Vec<Attempt>,
    },
    Exhausted {
        last_error: TranslationError,
        attempts_used: u32,
        history: Vec<Attempt>,
    },
}

impl DispatchOutcome {
    pub fn attempts_used(&self) -> u32 {
        match self {
            DispatchOutcome::Succeeded { attempts_used, .. }
            | DispatchOutcome::Exhausted { attempts_used, .. } => *attempts_used,
        }
    }

    pub fn history(&self) -> &[Attempt] {
        match self {
            DispatchOutcome::Succeeded { history, .. } | DispatchOutcome::Exhausted { history, .. } => {
                history
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, DispatchOutcome::Succeeded { .. })
    }
}

/// 重试调度器
///
/// 端点池和退避参数在构造后不变；随机源可以注入以便测试复现。
pub struct RetryDispatcher {
    client: Arc<dyn TranslationClient>,
    pool: EndpointPool,
    sample_size: usize,
    max_retries: u32,
    backoff: BackoffPolicy,
    deadline: Option<Duration>,
    rng: Mutex<StdRng>,
}

impl RetryDispatcher {
    /// 创建调度器
    ///
    /// 抽样大小超出端点池或重试次数为 0 时返回配置错误。
    pub fn new(
        client: Arc<dyn TranslationClient>,
        pool: EndpointPool,
        sample_size: usize,
        retry: &RetryConfig,
    ) -> Result<Self, ConfigError> {
        pool.check_sample_size(sample_size)?;
        if retry.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be at least 1".to_string()));
        }

        Ok(Self {
            client,
            pool,
            sample_size,
            max_retries: retry.max_retries,
            backoff: BackoffPolicy::from_config(retry),
            deadline: None,
            rng: Mutex::new(StdRng::from_entropy()),
        })
    }

    /// 替换随机源
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = Mutex::new(rng);
        self
    }

    /// 设置单个请求的总时限，覆盖所有尝试与等待
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    pub fn pool(&self) -> &EndpointPool {
        &self.pool
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 使用配置的重试参数执行请求
    pub async fn execute(&self, request: &TranslationRequest) -> DispatchOutcome {
        self.execute_with(request, self.max_retries, &self.backoff).await
    }

    /// 使用指定的重试次数和退避策略执行请求
    ///
    /// 状态转换为 `Attempting(n) -> Succeeded | Retrying(n+1) | Exhausted`。
    /// 成功后不会再等待；第 `max_retries` 次失败后立即结束。
    pub async fn execute_with(
        &self,
        request: &TranslationRequest,
        max_retries: u32,
        backoff: &BackoffPolicy,
    ) -> DispatchOutcome {
        let max_retries = max_retries.max(1);
        let started = Instant::now();
        let deadline = self.deadline.map(|limit| started + limit);
        let mut history = Vec::with_capacity(max_retries as usize);
        let mut attempt = 1;

        loop {
            let sample = {
                let mut rng = self.rng();
                self.pool.draw(self.sample_size, &mut *rng)
            };
            let primary = sample.primary().clone();

            tracing::debug!(
                "第 {} 次尝试，主端点: {} ({})",
                attempt,
                primary.address,
                primary.identity
            );

            let call = self.client.translate(
                request.text(),
                request.source_lang(),
                request.target_lang(),
                &primary,
            );
            let result = match deadline {
                Some(deadline) => match timeout_at(deadline, call).await {
                    Ok(result) => result,
                    Err(_) => Err(TranslationError::Timeout(elapsed_ms(started))),
                },
                None => call.await,
            }
            .and_then(|result| {
                if result.text.trim().is_empty() {
                    Err(TranslationError::EmptyResult)
                } else {
                    Ok(result)
                }
            });

            let error = match result {
                Ok(result) => {
                    history.push(Attempt {
                        index: attempt,
                        endpoints: sample,
                        outcome: AttemptOutcome::Succeeded,
                        backoff: None,
                    });
                    tracing::debug!("第 {} 次尝试成功", attempt);
                    return DispatchOutcome::Succeeded {
                        result,
                        attempts_used: attempt,
                        primary_endpoint: primary,
                        history,
                    };
                }
                Err(error) => error,
            };

            let timed_out = matches!(error, TranslationError::Timeout(_));
            if attempt >= max_retries || timed_out {
                tracing::warn!("翻译在 {} 次尝试后失败: {}", attempt, error);
                history.push(Attempt {
                    index: attempt,
                    endpoints: sample,
                    outcome: AttemptOutcome::Failed(error.to_string()),
                    backoff: None,
                });
                return DispatchOutcome::Exhausted {
                    last_error: error,
                    attempts_used: attempt,
                    history,
                };
            }

            let delay = {
                let mut rng = self.rng();
                backoff.delay(attempt, &mut *rng)
            };
            let wake = Instant::now() + delay;
            if deadline.is_some_and(|deadline| wake > deadline) {
                tracing::warn!(
                    "第 {} 次尝试失败: {}，等待 {}ms 将超过请求时限，停止重试",
                    attempt,
                    error,
                    delay.as_millis()
                );
                history.push(Attempt {
                    index: attempt,
                    endpoints: sample,
                    outcome: AttemptOutcome::Failed(error.to_string()),
                    backoff: None,
                });
                return DispatchOutcome::Exhausted {
                    last_error: error,
                    attempts_used: attempt,
                    history,
                };
            }

            tracing::warn!(
                "第 {} 次尝试失败: {}，{}ms 后重试",
                attempt,
                error,
                delay.as_millis()
            );
            history.push(Attempt {
                index: attempt,
                endpoints: sample,
                outcome: AttemptOutcome::Failed(error.to_string()),
                backoff: Some(delay),
            });

            sleep_until(wake).await;
            attempt += 1;
        }
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}
