use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::position::Position;

/// 投资组合快照
///
/// 周期性全量重建（不做增量维护），只作为缓存使用，
/// 交易历史的真实来源是订单流水
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    /// 总权益 = 可用余额 + 未实现盈亏
    pub total_equity: f64,
    pub available_balance: f64,
    pub total_unrealized_pnl: f64,
    pub total_realized_pnl: f64,
    pub drawdown_percent: f64,
    pub positions: Vec<Position>,
    pub timestamp: DateTime<Utc>,
}

impl PortfolioSnapshot {
    pub fn build(
        available_balance: f64,
        positions: Vec<Position>,
        total_realized_pnl: f64,
        drawdown_percent: f64,
    ) -> Self {
        let total_unrealized_pnl: f64 = positions.iter().map(|p| p.unrealized_pnl).sum();
        Self {
            total_equity: available_balance + total_unrealized_pnl,
            available_balance,
            total_unrealized_pnl,
            total_realized_pnl,
            drawdown_percent,
            positions,
            timestamp: Utc::now(),
        }
    }

    /// 当前未平仓数量
    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }
}
