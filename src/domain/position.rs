//! 持仓实体
//!
//! 每个品种最多一个未平仓持仓（不做对冲）。入场订单成交时创建，
//! 价格更新时重算未实现盈亏，减仓/平仓时结转已实现盈亏，数量归零时销毁。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::enums::PositionSide;

#[derive(Error, Debug)]
pub enum PositionError {
    #[error("持仓参数无效: {0}")]
    InvalidParameter(String),

    #[error("减仓数量超过持仓数量: {0} > {1}")]
    ReduceExceedsQuantity(f64, f64),
}

/// 持仓实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,

    /// 平均开仓价
    pub entry_price: f64,

    /// 当前价格
    pub current_price: f64,

    /// 持仓数量
    pub quantity: f64,

    /// 未实现盈亏
    pub unrealized_pnl: f64,

    /// 已实现盈亏
    pub realized_pnl: f64,

    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,

    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Position {
    pub fn new(
        symbol: &str,
        side: PositionSide,
        entry_price: f64,
        quantity: f64,
    ) -> Result<Self, PositionError> {
        if quantity <= 0.0 {
            return Err(PositionError::InvalidParameter(format!(
                "持仓数量必须为正数: {}",
                quantity
            )));
        }
        if entry_price <= 0.0 {
            return Err(PositionError::InvalidParameter(format!(
                "开仓价必须为正数: {}",
                entry_price
            )));
        }

        let now = Utc::now();
        Ok(Self {
            symbol: symbol.to_string(),
            side,
            entry_price,
            current_price: entry_price,
            quantity,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            stop_loss: None,
            take_profit: None,
            opened_at: now,
            updated_at: now,
        })
    }

    /// 方向感知的单位价差: Long为 exit-entry，Short为 entry-exit
    fn side_diff(&self, exit_price: f64) -> f64 {
        match self.side {
            PositionSide::Long => exit_price - self.entry_price,
            PositionSide::Short => self.entry_price - exit_price,
        }
    }

    /// 更新当前价格并重算未实现盈亏，不触碰已实现盈亏与数量
    pub fn update_price(&mut self, price: f64) {
        self.current_price = price;
        self.unrealized_pnl = self.side_diff(price) * self.quantity;
        self.updated_at = Utc::now();
    }

    /// 同向加仓，开仓价按数量加权平均
    pub fn add(&mut self, price: f64, quantity: f64) -> Result<(), PositionError> {
        if quantity <= 0.0 {
            return Err(PositionError::InvalidParameter(format!(
                "加仓数量必须为正数: {}",
                quantity
            )));
        }
        let total = self.quantity + quantity;
        self.entry_price = (self.entry_price * self.quantity + price * quantity) / total;
        self.quantity = total;
        self.update_price(price);
        Ok(())
    }

    /// 减仓/平仓，返回本次结转的已实现盈亏。数量归零即完全平仓
    pub fn reduce(&mut self, exit_price: f64, quantity: f64) -> Result<f64, PositionError> {
        if quantity <= 0.0 {
            return Err(PositionError::InvalidParameter(format!(
                "减仓数量必须为正数: {}",
                quantity
            )));
        }
        // 数量比较留一点浮点余量
        if quantity > self.quantity + 1e-12 {
            return Err(PositionError::ReduceExceedsQuantity(quantity, self.quantity));
        }

        let realized = self.side_diff(exit_price) * quantity;
        self.realized_pnl += realized;
        self.quantity -= quantity;
        if self.quantity < 1e-12 {
            self.quantity = 0.0;
        }
        self.update_price(exit_price);
        Ok(realized)
    }

    /// 是否已完全平仓
    pub fn is_closed(&self) -> bool {
        self.quantity <= 0.0
    }

    /// 持仓市值
    pub fn notional(&self) -> f64 {
        self.current_price * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_long_realized_pnl() {
        // Long: entry=50000, exit=51000, qty=0.1 → +100
        let mut pos = Position::new("BTC-USDT", PositionSide::Long, 50000.0, 0.1).unwrap();
        let realized = pos.reduce(51000.0, 0.1).unwrap();
        assert_relative_eq!(realized, 100.0);
        assert!(pos.is_closed());
    }

    #[test]
    fn test_short_realized_pnl() {
        // Short: entry=50000, exit=49000, qty=0.1 → +100
        let mut pos = Position::new("BTC-USDT", PositionSide::Short, 50000.0, 0.1).unwrap();
        let realized = pos.reduce(49000.0, 0.1).unwrap();
        assert_relative_eq!(realized, 100.0);
        assert!(pos.is_closed());
    }

    #[test]
    fn test_unrealized_pnl_does_not_touch_realized() {
        let mut pos = Position::new("BTC-USDT", PositionSide::Long, 50000.0, 0.2).unwrap();
        pos.update_price(52000.0);
        assert_relative_eq!(pos.unrealized_pnl, 400.0);
        assert_relative_eq!(pos.realized_pnl, 0.0);
        assert_relative_eq!(pos.quantity, 0.2);
    }

    #[test]
    fn test_partial_close_reduces_quantity() {
        let mut pos = Position::new("BTC-USDT", PositionSide::Long, 50000.0, 0.2).unwrap();
        let realized = pos.reduce(51000.0, 0.1).unwrap();
        assert_relative_eq!(realized, 100.0);
        assert_relative_eq!(pos.quantity, 0.1);
        assert!(!pos.is_closed());
    }

    #[test]
    fn test_reduce_more_than_quantity_fails() {
        let mut pos = Position::new("BTC-USDT", PositionSide::Long, 50000.0, 0.1).unwrap();
        assert!(pos.reduce(51000.0, 0.2).is_err());
    }

    #[test]
    fn test_add_averages_entry_price() {
        let mut pos = Position::new("BTC-USDT", PositionSide::Long, 50000.0, 0.1).unwrap();
        pos.add(52000.0, 0.1).unwrap();
        assert_relative_eq!(pos.entry_price, 51000.0);
        assert_relative_eq!(pos.quantity, 0.2);
    }
}
