//! 滑动窗口速率限制模块
//!
//! 为每个键维护最近一个窗口内被准入调用的时间戳，并据此决定是否准入新调用。

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// 准入决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 已准入，本次调用已被记录
    Admitted,
    /// 已拒绝，本次调用未被记录
    Rejected {
        /// 建议的重试等待时间（即窗口长度）
        retry_after: Duration,
    },
}

impl Admission {
    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted)
    }

    /// 以秒为单位的重试提示，准入时为 0
    pub fn retry_after_seconds(&self) -> u64 {
        match self {
            Admission::Admitted => 0,
            Admission::Rejected { retry_after } => ceil_secs(*retry_after),
        }
    }
}

pub(crate) fn ceil_secs(duration: Duration) -> u64 {
    duration.as_secs() + u64::from(duration.subsec_nanos() > 0)
}

/// 滑动窗口速率限制器
///
/// 每个键保存窗口 `(now - window, now]` 内被准入调用的时间戳。
/// 当记录数小于 `max_calls` 时准入并追加 `now`，否则拒绝且不记录。
///
/// # 并发
///
/// 状态存放在 [`DashMap`] 中。同一键的检查与追加在该键所在分片的写锁内完成，
/// 因此并发调用不会同时读到过期计数而一起越过上限；不同分片的键互不争用。
///
/// # 示例
///
/// ```rust
/// use std::time::{Duration, Instant};
/// use translate_gateway::RateWindow;
///
/// let window = RateWindow::new(2, Duration::from_secs(60));
/// let now = Instant::now();
///
/// assert!(window.allow("client", now).is_admitted());
/// assert!(window.allow("client", now).is_admitted());
/// assert_eq!(window.allow("client", now).retry_after_seconds(), 60);
/// ```
#[derive(Debug)]
pub struct RateWindow {
    max_calls: usize,
    window: Duration,
    calls: DashMap<String, VecDeque<Instant>>,
}

impl RateWindow {
    pub fn new(max_calls: usize, window: Duration) -> Self {
        Self {
            max_calls,
            window,
            calls: DashMap::new(),
        }
    }

    pub fn max_calls(&self) -> usize {
        self.max_calls
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// 检查 `key` 在 `now` 时刻是否可以准入，准入时记录本次调用
    pub fn allow(&self, key: &str, now: Instant) -> Admission {
        let mut history = match self.calls.get_mut(key) {
            Some(history) => history,
            None => self.calls.entry(key.to_owned()).or_default(),
        };

        let window = self.window;
        history.retain(|&at| !expired(at, now, window));

        if history.len() >= self.max_calls {
            return Admission::Rejected {
                retry_after: self.window,
            };
        }

        history.push_back(now);
        Admission::Admitted
    }

    /// 当前窗口内 `key` 的已准入调用数
    pub fn in_window(&self, key: &str, now: Instant) -> usize {
        self.calls
            .get(key)
            .map(|history| {
                history
                    .iter()
                    .filter(|&&at| !expired(at, now, self.window))
                    .count()
            })
            .unwrap_or(0)
    }

    /// 跟踪中的键数量
    pub fn tracked_keys(&self) -> usize {
        self.calls.len()
    }

    /// 移除所有记录均已过期的键，返回移除数量
    pub fn purge_idle(&self, now: Instant) -> usize {
        let before = self.calls.len();
        let window = self.window;
        self.calls.retain(|_, history| {
            history.retain(|&at| !expired(at, now, window));
            !history.is_empty()
        });
        before.saturating_sub(self.calls.len())
    }

    /// 启动后台清理任务，每隔 `interval` 移除空闲键
    pub fn spawn_cleanup(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.purge_idle(Instant::now());
                if removed > 0 {
                    tracing::debug!("清理了 {} 个空闲的速率限制键", removed);
                }
            }
        })
    }
}

// 恰好 window 之前的记录视为过期
fn expired(at: Instant, now: Instant, window: Duration) -> bool {
    now.saturating_duration_since(at) >= window
}
