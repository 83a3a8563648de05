//! 事件总线上流转的事件类型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::order::Order;
use crate::domain::signal::TradeSignal;
use crate::domain::tick::Tick;

/// 系统健康状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HealthStatus {
    Healthy,
    Degraded,
}

/// 系统健康事件，行情接入降级/恢复时发布，每次状态迁移只发一次
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthEvent {
    pub component: String,
    pub status: HealthStatus,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthEvent {
    pub fn new(component: &str, status: HealthStatus, detail: &str) -> Self {
        Self {
            component: component.to_string(),
            status,
            detail: detail.to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// 风控告警事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlertEvent {
    pub symbol: String,
    /// 稳定的拒绝原因字符串
    pub reason: String,
    pub signal_id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RiskAlertEvent {
    pub fn new(symbol: &str, reason: &str, signal_id: Option<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            reason: reason.to_string(),
            signal_id,
            timestamp: Utc::now(),
        }
    }
}

/// kill-switch事件
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KillSwitchEvent {
    pub is_active: bool,
    pub reason: String,
    pub drawdown_percent: f64,
    pub timestamp: DateTime<Utc>,
}

/// 总线事件。进程内总线直接克隆传递，Redis总线走JSON序列化
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum BusEvent {
    Tick(Tick),
    Signal(TradeSignal),
    ApprovedOrder(Order),
    ExecutedOrder(Order),
    RiskAlert(RiskAlertEvent),
    KillSwitch(KillSwitchEvent),
    SystemHealth(HealthEvent),
}

impl BusEvent {
    /// 事件归属的品种，用于日志
    pub fn symbol(&self) -> Option<&str> {
        match self {
            BusEvent::Tick(t) => Some(&t.symbol),
            BusEvent::Signal(s) => Some(&s.symbol),
            BusEvent::ApprovedOrder(o) | BusEvent::ExecutedOrder(o) => Some(&o.symbol),
            BusEvent::RiskAlert(a) => Some(&a.symbol),
            BusEvent::KillSwitch(_) | BusEvent::SystemHealth(_) => None,
        }
    }
}
