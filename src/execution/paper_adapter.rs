//! Paper适配器
//!
//! 用缓存里的最新价模拟成交：市价单立即按最新价±滑点成交，
//! 限价/止损单挂起，查询时检查最新价是否触及。订单ID为合成ID，
//! 余额为模拟余额。Paper/Backtest/Simulation模式共用。

use std::sync::Mutex;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use dashmap::DashMap;
use tracing::{debug, info};

use crate::app_config::redis as app_redis;
use crate::app_config::settings::PaperSettings;
use crate::domain::enums::{OrderSide, OrderStatus, OrderType};
use crate::domain::order::Order;
use crate::execution::adapter::ExecutionAdapter;

pub struct PaperAdapter {
    settings: PaperSettings,
    balance: Mutex<f64>,
    /// 合成订单簿，key是合成的exchange_order_id
    orders: DashMap<String, Order>,
}

impl PaperAdapter {
    pub fn new(settings: PaperSettings) -> Self {
        Self {
            balance: Mutex::new(settings.initial_balance),
            settings,
            orders: DashMap::new(),
        }
    }

    fn synthetic_id() -> String {
        format!("paper-{}", uuid::Uuid::new_v4().simple())
    }

    /// 合成ID前缀，执行引擎用它区分订单归属的适配器
    pub fn owns_order(order: &Order) -> bool {
        order
            .exchange_order_id
            .as_deref()
            .map(|id| id.starts_with("paper-"))
            .unwrap_or(false)
    }

    async fn latest_price(&self, symbol: &str) -> Result<f64> {
        app_redis::get_latest_price(symbol)
            .await?
            .ok_or_else(|| anyhow!("缓存中无最新价，无法模拟成交: {}", symbol))
    }

    /// 市价单滑点：买单抬价、卖单压价
    fn slipped_price(&self, price: f64, side: OrderSide) -> f64 {
        let slip = price * self.settings.slippage_bps / 10_000.0;
        match side {
            OrderSide::Buy => price + slip,
            OrderSide::Sell => price - slip,
        }
    }

    /// 成交结算：手续费计提 + 模拟余额变动
    fn settle_fill(&self, order: &mut Order, fill_price: f64) {
        let notional = fill_price * order.quantity;
        let commission = notional * self.settings.fee_bps / 10_000.0;

        let mut balance = self.balance.lock().unwrap();
        match order.side {
            OrderSide::Buy => *balance -= notional + commission,
            OrderSide::Sell => *balance += notional - commission,
        }

        // mark_filled只会在非终态调用，结算路径上不会失败
        let _ = order.mark_filled(fill_price, commission);
        debug!(
            "模拟成交: symbol={}, side={}, px={}, qty={}, balance={:.2}",
            order.symbol, order.side, fill_price, order.quantity, *balance
        );
    }

    /// 挂起订单的触发检查
    fn should_trigger(order: &Order, latest_price: f64) -> Option<f64> {
        match order.order_type {
            OrderType::Limit => {
                let limit = order.price?;
                let crossed = match order.side {
                    OrderSide::Buy => latest_price <= limit,
                    OrderSide::Sell => latest_price >= limit,
                };
                crossed.then_some(limit)
            }
            OrderType::StopLoss => {
                let stop = order.stop_price?;
                let triggered = match order.side {
                    // 空头止损在价格上穿触发，多头止损在价格下穿触发
                    OrderSide::Buy => latest_price >= stop,
                    OrderSide::Sell => latest_price <= stop,
                };
                triggered.then_some(stop)
            }
            OrderType::Market => None,
        }
    }

    fn park(&self, order: &Order) -> Order {
        let mut parked = order.clone();
        parked.exchange_order_id = Some(Self::synthetic_id());
        self.orders
            .insert(parked.exchange_order_id.clone().unwrap_or_default(), parked.clone());
        parked
    }
}

#[async_trait]
impl ExecutionAdapter for PaperAdapter {
    async fn place_market(&self, order: &Order) -> Result<Order> {
        let latest = self.latest_price(&order.symbol).await?;
        let fill_price = self.slipped_price(latest, order.side);

        let mut filled = order.clone();
        filled.exchange_order_id = Some(Self::synthetic_id());
        self.settle_fill(&mut filled, fill_price);

        self.orders
            .insert(filled.exchange_order_id.clone().unwrap_or_default(), filled.clone());
        info!(
            "paper市价单成交: symbol={}, side={}, qty={}, px={}",
            filled.symbol, filled.side, filled.quantity, fill_price
        );
        Ok(filled)
    }

    async fn place_limit(&self, order: &Order) -> Result<Order> {
        Ok(self.park(order))
    }

    async fn place_stop_loss(&self, order: &Order) -> Result<Order> {
        Ok(self.park(order))
    }

    async fn cancel_order(&self, order: &Order) -> Result<Order> {
        let id = order
            .exchange_order_id
            .as_deref()
            .ok_or_else(|| anyhow!("订单尚未提交，无法撤单: {}", order.id))?;

        let mut entry = self
            .orders
            .get_mut(id)
            .ok_or_else(|| anyhow!("paper订单不存在: {}", id))?;

        if !entry.is_terminal() {
            entry.status = OrderStatus::Canceled;
            entry.updated_at = chrono::Utc::now();
        }
        Ok(entry.clone())
    }

    async fn query_order(&self, order: &Order) -> Result<Order> {
        let id = order
            .exchange_order_id
            .as_deref()
            .ok_or_else(|| anyhow!("订单尚未提交，无法查询: {}", order.id))?;

        // 先只读取，触发成交需要先拿到最新价
        let parked = self
            .orders
            .get(id)
            .map(|e| e.clone())
            .ok_or_else(|| anyhow!("paper订单不存在: {}", id))?;
        if parked.is_terminal() {
            return Ok(parked);
        }

        let latest = self.latest_price(&parked.symbol).await?;
        if let Some(trigger_price) = Self::should_trigger(&parked, latest) {
            let mut filled = parked.clone();
            self.settle_fill(&mut filled, trigger_price);
            self.orders.insert(id.to_string(), filled.clone());
            return Ok(filled);
        }
        Ok(parked)
    }

    async fn get_balance(&self) -> Result<f64> {
        Ok(*self.balance.lock().unwrap())
    }

    fn name(&self) -> &'static str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enums::OrderSide;

    fn paper_settings() -> PaperSettings {
        PaperSettings {
            initial_balance: 10000.0,
            slippage_bps: 0.0,
            fee_bps: 0.0,
        }
    }

    #[test]
    fn test_limit_trigger_rules() {
        let order = Order::new(
            "BTC-USDT",
            OrderSide::Buy,
            OrderType::Limit,
            0.1,
            Some(50000.0),
            None,
        )
        .unwrap();
        // 买限价：最新价跌破限价触发
        assert_eq!(PaperAdapter::should_trigger(&order, 49999.0), Some(50000.0));
        assert_eq!(PaperAdapter::should_trigger(&order, 50001.0), None);

        let order = Order::new(
            "BTC-USDT",
            OrderSide::Sell,
            OrderType::Limit,
            0.1,
            Some(50000.0),
            None,
        )
        .unwrap();
        assert_eq!(PaperAdapter::should_trigger(&order, 50001.0), Some(50000.0));
        assert_eq!(PaperAdapter::should_trigger(&order, 49999.0), None);
    }

    #[test]
    fn test_stop_loss_trigger_rules() {
        // 多头止损 = 卖出止损单，价格下穿止损价触发
        let order = Order::new(
            "BTC-USDT",
            OrderSide::Sell,
            OrderType::StopLoss,
            0.1,
            None,
            Some(49000.0),
        )
        .unwrap();
        assert_eq!(PaperAdapter::should_trigger(&order, 48900.0), Some(49000.0));
        assert_eq!(PaperAdapter::should_trigger(&order, 49100.0), None);
    }

    #[test]
    fn test_slippage_direction() {
        let adapter = PaperAdapter::new(PaperSettings {
            initial_balance: 10000.0,
            slippage_bps: 10.0,
            fee_bps: 0.0,
        });
        assert!(adapter.slipped_price(50000.0, OrderSide::Buy) > 50000.0);
        assert!(adapter.slipped_price(50000.0, OrderSide::Sell) < 50000.0);
    }

    #[test]
    fn test_settle_fill_adjusts_balance() {
        let adapter = PaperAdapter::new(paper_settings());
        let mut order =
            Order::new("BTC-USDT", OrderSide::Buy, OrderType::Market, 0.1, None, None).unwrap();
        adapter.settle_fill(&mut order, 50000.0);

        assert_eq!(order.status, OrderStatus::Filled);
        assert_eq!(order.filled_price, 50000.0);
        // 10000 - 0.1×50000 = 5000
        assert_eq!(*adapter.balance.lock().unwrap(), 5000.0);
    }

    #[test]
    fn test_owns_order_by_prefix() {
        let mut order =
            Order::new("BTC-USDT", OrderSide::Buy, OrderType::Market, 0.1, None, None).unwrap();
        assert!(!PaperAdapter::owns_order(&order));
        order.exchange_order_id = Some("paper-abc".to_string());
        assert!(PaperAdapter::owns_order(&order));
        order.exchange_order_id = Some("123456".to_string());
        assert!(!PaperAdapter::owns_order(&order));
    }
}
