//! 滑动窗口限流器
//!
//! 交易所REST接口有请求权重预算，超限会被封禁。限流器在调用方主动等待，
//! 而不是依赖交易所侧的拒绝。

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use tracing::debug;

pub struct SlidingWindowRateLimiter {
    /// 统计窗口
    window: Duration,
    /// 窗口内的权重预算
    budget: u32,
    /// (时间戳, 权重) 记录，窗口外的条目惰性清理
    entries: Mutex<VecDeque<(Instant, u32)>>,
}

impl SlidingWindowRateLimiter {
    pub fn new(window: Duration, budget: u32) -> Self {
        Self {
            window,
            budget,
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// 每分钟预算的便捷构造
    pub fn per_minute(budget: u32) -> Self {
        Self::new(Duration::from_secs(60), budget)
    }

    /// 申请weight的配额，预算不足时等待到最早的条目滑出窗口
    pub async fn acquire(&self, weight: u32) {
        loop {
            let wait = {
                let mut entries = self.entries.lock().unwrap();
                let now = Instant::now();
                while let Some(&(t, _)) = entries.front() {
                    if now.duration_since(t) >= self.window {
                        entries.pop_front();
                    } else {
                        break;
                    }
                }

                let used: u32 = entries.iter().map(|&(_, w)| w).sum();
                if used + weight <= self.budget {
                    entries.push_back((now, weight));
                    None
                } else {
                    // 等到最早的条目过期再试
                    entries
                        .front()
                        .map(|&(t, _)| self.window.saturating_sub(now.duration_since(t)))
                }
            };

            match wait {
                None => return,
                Some(d) => {
                    debug!("请求权重超出预算，等待 {:?}", d);
                    tokio::time::sleep(d.max(Duration::from_millis(10))).await;
                }
            }
        }
    }

    /// 当前窗口已用权重
    pub fn used(&self) -> u32 {
        let mut entries = self.entries.lock().unwrap();
        let now = Instant::now();
        while let Some(&(t, _)) = entries.front() {
            if now.duration_since(t) >= self.window {
                entries.pop_front();
            } else {
                break;
            }
        }
        entries.iter().map(|&(_, w)| w).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_acquire_within_budget_is_immediate() {
        let limiter = SlidingWindowRateLimiter::new(Duration::from_secs(1), 10);
        let start = Instant::now();
        limiter.acquire(5).await;
        limiter.acquire(5).await;
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.used(), 10);
    }

    #[tokio::test]
    async fn test_acquire_over_budget_waits() {
        let limiter = SlidingWindowRateLimiter::new(Duration::from_millis(200), 10);
        limiter.acquire(10).await;
        let start = Instant::now();
        // 预算用尽，必须等窗口滑动
        limiter.acquire(1).await;
        assert!(start.elapsed() >= Duration::from_millis(150));
    }

    #[tokio::test]
    async fn test_window_slides() {
        let limiter = SlidingWindowRateLimiter::new(Duration::from_millis(100), 5);
        limiter.acquire(5).await;
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(limiter.used(), 0);
    }
}
