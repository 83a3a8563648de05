//! kill-switch管理
//!
//! 全局唯一、显式注入的熔断开关：手动触发或回撤超限触发。
//! 一旦Active只能由人工显式解除，check之间永不自动清除。

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// kill-switch状态
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchState {
    pub is_active: bool,
    pub activated_at: Option<DateTime<Utc>>,
    pub reason: Option<String>,
}

pub struct KillSwitchManager {
    state: Mutex<KillSwitchState>,
    /// 触发kill的最大回撤%
    max_drawdown_percent: f64,
}

impl KillSwitchManager {
    pub fn new(max_drawdown_percent: f64) -> Self {
        Self {
            state: Mutex::new(KillSwitchState {
                is_active: false,
                activated_at: None,
                reason: None,
            }),
            max_drawdown_percent,
        }
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().unwrap().is_active
    }

    pub fn state(&self) -> KillSwitchState {
        self.state.lock().unwrap().clone()
    }

    /// 手动触发
    pub fn activate(&self, reason: &str) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.is_active {
            return false;
        }
        warn!("kill-switch触发: {}", reason);
        state.is_active = true;
        state.activated_at = Some(Utc::now());
        state.reason = Some(reason.to_string());
        true
    }

    /// 人工解除，这是Active→Inactive的唯一路径
    pub fn deactivate(&self) {
        let mut state = self.state.lock().unwrap();
        if state.is_active {
            info!("kill-switch人工解除，此前原因: {:?}", state.reason);
        }
        state.is_active = false;
        state.activated_at = None;
        state.reason = None;
    }

    /// 检查触发条件。返回Some(reason)表示本次调用新触发了kill
    pub fn check_conditions(&self, current_drawdown_percent: f64) -> Option<String> {
        if self.is_active() {
            // 已经Active，保持不变
            return None;
        }
        if current_drawdown_percent >= self.max_drawdown_percent {
            let reason = format!(
                "drawdown {:.2}% >= max {:.2}%",
                current_drawdown_percent, self.max_drawdown_percent
            );
            self.activate(&reason);
            return Some(reason);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_starts_inactive() {
        let ks = KillSwitchManager::new(20.0);
        assert!(!ks.is_active());
    }

    #[test]
    fn test_drawdown_trips_kill_switch() {
        let ks = KillSwitchManager::new(20.0);
        let reason = ks.check_conditions(25.0);
        assert!(reason.is_some());
        assert!(ks.is_active());
    }

    #[test]
    fn test_below_threshold_does_not_trip() {
        let ks = KillSwitchManager::new(20.0);
        assert!(ks.check_conditions(19.9).is_none());
        assert!(!ks.is_active());
    }

    #[test]
    fn test_monotone_until_manual_deactivation() {
        let ks = KillSwitchManager::new(20.0);
        ks.check_conditions(25.0);
        assert!(ks.is_active());

        // 回撤恢复也不会自动解除
        for _ in 0..10 {
            ks.check_conditions(0.0);
            assert!(ks.is_active());
        }

        ks.deactivate();
        assert!(!ks.is_active());
    }

    #[test]
    fn test_check_after_trip_returns_none() {
        let ks = KillSwitchManager::new(20.0);
        assert!(ks.check_conditions(30.0).is_some());
        // 已触发状态下再次check不重复报告
        assert!(ks.check_conditions(30.0).is_none());
    }

    #[test]
    fn test_manual_activate_records_reason() {
        let ks = KillSwitchManager::new(20.0);
        assert!(ks.activate("operator halt"));
        let state = ks.state();
        assert!(state.is_active);
        assert_eq!(state.reason.as_deref(), Some("operator halt"));
        assert!(state.activated_at.is_some());

        // 重复触发返回false
        assert!(!ks.activate("again"));
    }
}
