//! 持仓追踪
//!
//! 每个品种最多一条持仓。入场成交开仓或同向加仓，反向成交减仓/平仓
//! 并结转已实现盈亏。未实现盈亏在快照重建周期内按缓存最新价重算，
//! 不逐tick更新（沿用原有的定时全量重建策略）。

use std::sync::Mutex;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::app_config::redis as app_redis;
use crate::domain::enums::{OrderSide, PositionSide};
use crate::domain::order::Order;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::position::Position;

/// 单次成交对持仓集合的影响
enum FillOutcome {
    /// 新开仓或持仓变化，携带变化后的持仓用于缓存镜像
    Updated(Position),
    /// 持仓数量归零被销毁
    Closed(String),
    /// 无效成交，忽略
    Ignored,
}

pub struct PositionTracker {
    /// 未平仓持仓，key为symbol
    positions: DashMap<String, Position>,
    /// 累计已实现盈亏（含已销毁的持仓）
    total_realized_pnl: Mutex<f64>,
}

impl PositionTracker {
    pub fn new() -> Self {
        Self {
            positions: DashMap::new(),
            total_realized_pnl: Mutex::new(0.0),
        }
    }

    /// 应用一次成交。fill_quantity是本次成交增量
    pub async fn apply_fill(&self, order: &Order, fill_quantity: f64, fill_price: f64) {
        match self.apply_fill_sync(order, fill_quantity, fill_price) {
            FillOutcome::Updated(position) => self.mirror_position(&position).await,
            FillOutcome::Closed(symbol) => {
                info!("持仓已平仓销毁: symbol={}", symbol);
                if let Err(e) = app_redis::delete_key(&app_redis::open_position_key(&symbol)).await
                {
                    warn!("持仓缓存删除失败: symbol={}, error={:?}", symbol, e);
                }
            }
            FillOutcome::Ignored => {}
        }
    }

    /// 持仓集合的同步变更，锁不跨越任何IO
    fn apply_fill_sync(&self, order: &Order, fill_quantity: f64, fill_price: f64) -> FillOutcome {
        if fill_quantity <= 0.0 || fill_price <= 0.0 {
            return FillOutcome::Ignored;
        }
        let symbol = order.symbol.as_str();

        if let Some(mut entry) = self.positions.get_mut(symbol) {
            let same_direction = matches!(
                (entry.side, order.side),
                (PositionSide::Long, OrderSide::Buy) | (PositionSide::Short, OrderSide::Sell)
            );

            if same_direction {
                if let Err(e) = entry.add(fill_price, fill_quantity) {
                    warn!("加仓失败: symbol={}, error={:?}", symbol, e);
                    return FillOutcome::Ignored;
                }
                return FillOutcome::Updated(entry.clone());
            }

            // 反向成交 = 减仓/平仓，数量超出持仓的部分忽略并告警
            let reduce_qty = fill_quantity.min(entry.quantity);
            if fill_quantity > entry.quantity {
                warn!(
                    "平仓数量超过持仓，按持仓数量截断: symbol={}, fill={}, held={}",
                    symbol, fill_quantity, entry.quantity
                );
            }
            match entry.reduce(fill_price, reduce_qty) {
                Ok(realized) => {
                    *self.total_realized_pnl.lock().unwrap() += realized;
                    info!(
                        "持仓减少: symbol={}, qty={}, realized={:.2}",
                        symbol, reduce_qty, realized
                    );
                }
                Err(e) => {
                    warn!("减仓失败: symbol={}, error={:?}", symbol, e);
                    return FillOutcome::Ignored;
                }
            }

            if entry.is_closed() {
                drop(entry);
                self.positions.remove(symbol);
                return FillOutcome::Closed(symbol.to_string());
            }
            return FillOutcome::Updated(entry.clone());
        }

        // 无已有持仓：开新仓
        let side = match order.side {
            OrderSide::Buy => PositionSide::Long,
            OrderSide::Sell => PositionSide::Short,
        };
        match Position::new(symbol, side, fill_price, fill_quantity) {
            Ok(mut position) => {
                position.stop_loss = order.stop_price;
                info!(
                    "开仓: symbol={}, side={}, entry={}, qty={}",
                    symbol, side, fill_price, fill_quantity
                );
                self.positions.insert(symbol.to_string(), position.clone());
                FillOutcome::Updated(position)
            }
            Err(e) => {
                warn!("开仓失败: symbol={}, error={:?}", symbol, e);
                FillOutcome::Ignored
            }
        }
    }

    /// 用缓存最新价重算所有持仓的未实现盈亏（快照重建周期调用）
    pub async fn refresh_prices(&self) {
        let symbols: Vec<String> = self.positions.iter().map(|e| e.key().clone()).collect();
        for symbol in symbols {
            match app_redis::get_latest_price(&symbol).await {
                Ok(Some(price)) => {
                    if let Some(mut entry) = self.positions.get_mut(&symbol) {
                        entry.update_price(price);
                    }
                }
                Ok(None) => {
                    // key缺失说明行情已过期，保留上次的价格估值
                    warn!("最新价缓存缺失，持仓估值使用陈旧价格: {}", symbol);
                }
                Err(e) => warn!("最新价读取失败: symbol={}, error={:?}", symbol, e),
            }
        }
    }

    /// 构建组合快照
    pub fn build_snapshot(
        &self,
        available_balance: f64,
        drawdown_percent: f64,
    ) -> PortfolioSnapshot {
        let positions: Vec<Position> = self.positions.iter().map(|e| e.value().clone()).collect();
        let total_realized = *self.total_realized_pnl.lock().unwrap();
        PortfolioSnapshot::build(available_balance, positions, total_realized, drawdown_percent)
    }

    pub fn open_positions(&self) -> Vec<Position> {
        self.positions.iter().map(|e| e.value().clone()).collect()
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.len()
    }

    pub fn get(&self, symbol: &str) -> Option<Position> {
        self.positions.get(symbol).map(|e| e.clone())
    }

    pub fn total_realized_pnl(&self) -> f64 {
        *self.total_realized_pnl.lock().unwrap()
    }

    async fn mirror_position(&self, position: &Position) {
        match serde_json::to_string(position) {
            Ok(payload) => {
                if let Err(e) = app_redis::set_with_ttl(
                    &app_redis::open_position_key(&position.symbol),
                    &payload,
                    app_redis::snapshot_ttl_secs(),
                )
                .await
                {
                    warn!(
                        "持仓缓存镜像失败: symbol={}, error={:?}",
                        position.symbol, e
                    );
                }
            }
            Err(e) => warn!("持仓序列化失败: {:?}", e),
        }
    }
}

impl Default for PositionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enums::OrderType;
    use approx::assert_relative_eq;

    fn buy_order(qty: f64) -> Order {
        Order::new("BTC-USDT", OrderSide::Buy, OrderType::Market, qty, None, None).unwrap()
    }

    fn sell_order(qty: f64) -> Order {
        Order::new("BTC-USDT", OrderSide::Sell, OrderType::Market, qty, None, None).unwrap()
    }

    #[test]
    fn test_entry_fill_opens_long() {
        let tracker = PositionTracker::new();
        tracker.apply_fill_sync(&buy_order(0.1), 0.1, 50000.0);

        let pos = tracker.get("BTC-USDT").unwrap();
        assert_eq!(pos.side, PositionSide::Long);
        assert_relative_eq!(pos.entry_price, 50000.0);
        assert_eq!(tracker.open_position_count(), 1);
    }

    #[test]
    fn test_opposite_fill_closes_and_realizes() {
        let tracker = PositionTracker::new();
        tracker.apply_fill_sync(&buy_order(0.1), 0.1, 50000.0);
        tracker.apply_fill_sync(&sell_order(0.1), 0.1, 51000.0);

        assert_eq!(tracker.open_position_count(), 0);
        assert_relative_eq!(tracker.total_realized_pnl(), 100.0);
    }

    #[test]
    fn test_partial_close_keeps_position() {
        let tracker = PositionTracker::new();
        tracker.apply_fill_sync(&buy_order(0.2), 0.2, 50000.0);
        tracker.apply_fill_sync(&sell_order(0.1), 0.1, 51000.0);

        let pos = tracker.get("BTC-USDT").unwrap();
        assert_relative_eq!(pos.quantity, 0.1);
        assert_relative_eq!(tracker.total_realized_pnl(), 100.0);
    }

    #[test]
    fn test_same_direction_fill_adds() {
        let tracker = PositionTracker::new();
        tracker.apply_fill_sync(&buy_order(0.1), 0.1, 50000.0);
        tracker.apply_fill_sync(&buy_order(0.1), 0.1, 52000.0);

        let pos = tracker.get("BTC-USDT").unwrap();
        assert_relative_eq!(pos.quantity, 0.2);
        assert_relative_eq!(pos.entry_price, 51000.0);
        assert_eq!(tracker.open_position_count(), 1);
    }

    #[test]
    fn test_snapshot_totals() {
        let tracker = PositionTracker::new();
        tracker.apply_fill_sync(&buy_order(0.1), 0.1, 50000.0);
        if let Some(mut entry) = tracker.positions.get_mut("BTC-USDT") {
            entry.update_price(51000.0);
        }

        let snapshot = tracker.build_snapshot(10000.0, 0.0);
        assert_relative_eq!(snapshot.total_unrealized_pnl, 100.0);
        assert_relative_eq!(snapshot.total_equity, 10100.0);
        assert_eq!(snapshot.open_position_count(), 1);
    }
}
