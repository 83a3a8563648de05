//! 回撤监控
//!
//! 跟踪权益峰值：回撤% = (峰值-当前)/峰值×100。峰值只增不减，
//! 显式reset时峰值=当前权益。读改写用一把窄锁保护。

use std::sync::Mutex;

use tracing::info;

#[derive(Debug, Clone, Copy)]
struct EquityState {
    peak: f64,
    current: f64,
}

pub struct DrawdownMonitor {
    state: Mutex<EquityState>,
}

impl DrawdownMonitor {
    pub fn new(initial_equity: f64) -> Self {
        Self {
            state: Mutex::new(EquityState {
                peak: initial_equity.max(0.0),
                current: initial_equity.max(0.0),
            }),
        }
    }

    /// 喂入最新权益，返回当前回撤%
    pub fn update(&self, equity: f64) -> f64 {
        let mut state = self.state.lock().unwrap();
        state.current = equity;
        if equity > state.peak {
            state.peak = equity;
        }
        Self::drawdown_of(&state)
    }

    /// 当前回撤%
    pub fn current_drawdown(&self) -> f64 {
        let state = self.state.lock().unwrap();
        Self::drawdown_of(&state)
    }

    /// 峰值权益
    pub fn peak_equity(&self) -> f64 {
        self.state.lock().unwrap().peak
    }

    /// 显式重置：峰值=当前权益，回撤立即归零
    pub fn reset(&self, equity: f64) {
        let mut state = self.state.lock().unwrap();
        state.peak = equity;
        state.current = equity;
        info!("回撤监控已重置: peak={}", equity);
    }

    fn drawdown_of(state: &EquityState) -> f64 {
        if state.peak <= 0.0 {
            return 0.0;
        }
        ((state.peak - state.current) / state.peak * 100.0).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_drawdown_basic() {
        // peak=10000, current=9500 → 5.0%
        let monitor = DrawdownMonitor::new(10000.0);
        let dd = monitor.update(9500.0);
        assert_relative_eq!(dd, 5.0);
    }

    #[test]
    fn test_new_high_resets_drawdown() {
        let monitor = DrawdownMonitor::new(10000.0);
        monitor.update(9500.0);
        // 创新高：峰值上移，回撤归零
        let dd = monitor.update(11000.0);
        assert_relative_eq!(dd, 0.0);
        assert_relative_eq!(monitor.peak_equity(), 11000.0);
    }

    #[test]
    fn test_peak_never_decreases_without_reset() {
        let monitor = DrawdownMonitor::new(10000.0);
        monitor.update(8000.0);
        monitor.update(9000.0);
        assert_relative_eq!(monitor.peak_equity(), 10000.0);
    }

    #[test]
    fn test_reset_zeroes_drawdown_immediately() {
        let monitor = DrawdownMonitor::new(10000.0);
        monitor.update(7000.0);
        assert!(monitor.current_drawdown() > 0.0);

        monitor.reset(7000.0);
        assert_relative_eq!(monitor.current_drawdown(), 0.0);
        assert_relative_eq!(monitor.peak_equity(), 7000.0);
    }

    #[test]
    fn test_zero_peak_is_zero_drawdown() {
        let monitor = DrawdownMonitor::new(0.0);
        assert_relative_eq!(monitor.current_drawdown(), 0.0);
    }
}
