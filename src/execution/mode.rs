//! 交易模式管理
//!
//! 显式注入的全局模式，熔断器打开时被强制切到Paper。

use std::sync::atomic::{AtomicU8, Ordering};

use tracing::warn;

use crate::domain::enums::TradingMode;

fn mode_to_u8(mode: TradingMode) -> u8 {
    match mode {
        TradingMode::Live => 0,
        TradingMode::Paper => 1,
        TradingMode::Backtest => 2,
        TradingMode::Simulation => 3,
    }
}

fn mode_from_u8(v: u8) -> TradingMode {
    match v {
        0 => TradingMode::Live,
        1 => TradingMode::Paper,
        2 => TradingMode::Backtest,
        _ => TradingMode::Simulation,
    }
}

pub struct TradingModeManager {
    mode: AtomicU8,
}

impl TradingModeManager {
    pub fn new(initial: TradingMode) -> Self {
        Self {
            mode: AtomicU8::new(mode_to_u8(initial)),
        }
    }

    pub fn current(&self) -> TradingMode {
        mode_from_u8(self.mode.load(Ordering::Acquire))
    }

    pub fn set(&self, mode: TradingMode) {
        self.mode.store(mode_to_u8(mode), Ordering::Release);
    }

    /// Live强制降级到Paper。返回true表示本次调用发生了切换
    pub fn force_paper(&self, reason: &str) -> bool {
        let switched = self
            .mode
            .compare_exchange(
                mode_to_u8(TradingMode::Live),
                mode_to_u8(TradingMode::Paper),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();
        if switched {
            warn!("交易模式已从Live切换到Paper: {}", reason);
        }
        switched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_force_paper_only_from_live() {
        let manager = TradingModeManager::new(TradingMode::Live);
        assert!(manager.force_paper("test"));
        assert_eq!(manager.current(), TradingMode::Paper);

        // 已经是Paper，再次调用不切换
        assert!(!manager.force_paper("test"));
        assert_eq!(manager.current(), TradingMode::Paper);
    }

    #[test]
    fn test_backtest_not_affected_by_force_paper() {
        let manager = TradingModeManager::new(TradingMode::Backtest);
        assert!(!manager.force_paper("test"));
        assert_eq!(manager.current(), TradingMode::Backtest);
    }
}
