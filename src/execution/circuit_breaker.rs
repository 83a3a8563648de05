//! 熔断器
//!
//! 三态：Closed(正常) → Open(熔断，快速失败) → HalfOpen(探测恢复)。
//! 触发条件是滑动窗口内的失败率达到阈值，且采样数达到下限。
//! Open经过冷却期后转HalfOpen放行一次探测，探测成功才回Closed。
//! 状态对外可观测，交易所订单边界的熔断器打开时由执行引擎
//! 把交易模式强制切到Paper。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::app_config::settings::BreakerSettings;

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

struct BreakerInner {
    state: CircuitState,
    /// 窗口内的采样 (时间, 是否失败)
    samples: VecDeque<(Instant, bool)>,
    /// 最近一次进入Open的时间
    opened_at: Option<Instant>,
}

pub struct CircuitBreaker {
    config: BreakerSettings,
    inner: Mutex<BreakerInner>,
}

impl CircuitBreaker {
    pub fn new(config: BreakerSettings) -> Self {
        Self {
            config,
            inner: Mutex::new(BreakerInner {
                state: CircuitState::Closed,
                samples: VecDeque::new(),
                opened_at: None,
            }),
        }
    }

    /// 是否放行调用。Open状态冷却期满时转入HalfOpen放行探测
    pub fn is_call_permitted(&self) -> bool {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let cooled_down = inner
                    .opened_at
                    .map(|t| t.elapsed() >= self.config.cooldown)
                    .unwrap_or(true);
                if cooled_down {
                    debug!("熔断器冷却期满，进入HalfOpen探测");
                    inner.state = CircuitState::HalfOpen;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// 记录一次成功
    pub fn record_success(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                Self::push_sample(&mut inner, &self.config, false);
            }
            CircuitState::HalfOpen => {
                // 探测成功，恢复Closed并清空窗口
                info!("熔断器探测成功，恢复Closed");
                inner.state = CircuitState::Closed;
                inner.samples.clear();
                inner.opened_at = None;
            }
            CircuitState::Open => {}
        }
    }

    /// 记录一次失败
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            CircuitState::Closed => {
                Self::push_sample(&mut inner, &self.config, true);
                let total = inner.samples.len();
                if total >= self.config.minimum_samples {
                    let failures = inner.samples.iter().filter(|&&(_, f)| f).count();
                    let ratio = failures as f64 / total as f64;
                    if ratio >= self.config.failure_ratio {
                        warn!(
                            "熔断器打开: 窗口失败率 {:.0}% (采样{}次)",
                            ratio * 100.0,
                            total
                        );
                        inner.state = CircuitState::Open;
                        inner.opened_at = Some(Instant::now());
                    }
                }
            }
            CircuitState::HalfOpen => {
                // 探测失败立即回Open
                warn!("熔断器探测失败，回到Open");
                inner.state = CircuitState::Open;
                inner.opened_at = Some(Instant::now());
            }
            CircuitState::Open => {}
        }
    }

    /// 当前状态
    pub fn state(&self) -> CircuitState {
        self.inner.lock().unwrap().state
    }

    /// 手动复位到Closed
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        info!("熔断器手动复位");
        inner.state = CircuitState::Closed;
        inner.samples.clear();
        inner.opened_at = None;
    }

    fn push_sample(inner: &mut BreakerInner, config: &BreakerSettings, failed: bool) {
        let now = Instant::now();
        inner.samples.push_back((now, failed));
        // 窗口外的采样滑出
        while let Some(&(t, _)) = inner.samples.front() {
            if now.duration_since(t) > config.sampling_window {
                inner.samples.pop_front();
            } else {
                break;
            }
        }
    }
}
