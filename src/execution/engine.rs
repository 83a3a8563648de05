//! 执行引擎
//!
//! 消费approved-orders：按当前交易模式查表选择适配器（每次调用时查，
//! 不缓存），有限次重试提交，交易所订单边界包一层熔断器。
//! 熔断器打开时Live调用快速失败、不触网，并把交易模式强制切到Paper。
//! 挂单状态由独立的同步循环推进，成交驱动持仓更新。

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use tokio_retry::strategy::FixedInterval;
use tokio_retry::RetryIf;
use tracing::{error, info, warn};

use crate::domain::enums::{OrderStatus, OrderType, TradingMode};
use crate::domain::events::{BusEvent, RiskAlertEvent};
use crate::domain::order::Order;
use crate::event_bus::{topics, EventBus};
use crate::execution::adapter::ExecutionAdapter;
use crate::execution::circuit_breaker::{CircuitBreaker, CircuitState};
use crate::execution::mode::TradingModeManager;
use crate::execution::order_tracker::OrderTracker;
use crate::execution::paper_adapter::PaperAdapter;
use crate::execution::position_tracker::PositionTracker;

pub struct ExecutionEngine {
    mode: Arc<TradingModeManager>,
    live: Arc<dyn ExecutionAdapter>,
    paper: Arc<dyn ExecutionAdapter>,
    breaker: Arc<CircuitBreaker>,
    order_tracker: Arc<OrderTracker>,
    position_tracker: Arc<PositionTracker>,
    bus: Arc<dyn EventBus>,
    max_retries: usize,
    retry_delay: Duration,
}

impl ExecutionEngine {
    pub fn new(
        mode: Arc<TradingModeManager>,
        live: Arc<dyn ExecutionAdapter>,
        paper: Arc<dyn ExecutionAdapter>,
        breaker: Arc<CircuitBreaker>,
        order_tracker: Arc<OrderTracker>,
        position_tracker: Arc<PositionTracker>,
        bus: Arc<dyn EventBus>,
        max_retries: usize,
        retry_delay: Duration,
    ) -> Self {
        Self {
            mode,
            live,
            paper,
            breaker,
            order_tracker,
            position_tracker,
            bus,
            max_retries: max_retries.max(1),
            retry_delay,
        }
    }

    /// 模式到适配器的查表，每次调用时解析
    fn adapter_for(&self, mode: TradingMode) -> Arc<dyn ExecutionAdapter> {
        match mode {
            TradingMode::Live => Arc::clone(&self.live),
            TradingMode::Paper | TradingMode::Backtest | TradingMode::Simulation => {
                Arc::clone(&self.paper)
            }
        }
    }

    /// 已提交订单归属的适配器（查询/撤单路径，与当前模式无关）
    fn adapter_for_order(&self, order: &Order) -> Arc<dyn ExecutionAdapter> {
        if PaperAdapter::owns_order(order) {
            Arc::clone(&self.paper)
        } else {
            Arc::clone(&self.live)
        }
    }

    /// approved-orders的总线handler入口
    pub async fn handle_approved_order(&self, order: Order) {
        match self.place_order(order.clone()).await {
            Ok(placed) => {
                if let Err(e) = self
                    .bus
                    .publish(topics::EXECUTED_ORDERS, &BusEvent::ExecutedOrder(placed))
                    .await
                {
                    error!("executed-orders发布失败: {:?}", e);
                }
            }
            Err(e) => {
                error!("下单失败: symbol={}, error={:?}", order.symbol, e);
                // 失败订单以Rejected落流水并广播
                let mut rejected = order;
                let _ = rejected.apply_update(OrderStatus::Rejected, 0.0, 0.0);
                crate::model::order_history::record(&rejected).await;
                if let Err(e) = self
                    .bus
                    .publish(topics::EXECUTED_ORDERS, &BusEvent::ExecutedOrder(rejected))
                    .await
                {
                    error!("executed-orders发布失败: {:?}", e);
                }
            }
        }
    }

    /// 下单：有限次重试，首个成功即返回，重试耗尽返回最后一次失败
    pub async fn place_order(&self, order: Order) -> Result<Order> {
        let mode = self.mode.current();

        if mode.is_live() && !self.breaker.is_call_permitted() {
            // 快速失败，不触网
            self.force_paper_fallback("circuit breaker open").await;
            return Err(anyhow!("交易所订单边界熔断中，Live下单快速失败"));
        }

        let strategy = FixedInterval::new(self.retry_delay).take(self.max_retries - 1);
        let attempt = || async {
            // 模式可能在重试间隙被熔断切换，每次尝试重新查表
            let mode = self.mode.current();
            let adapter = self.adapter_for(mode);
            let result = self.submit_via(&*adapter, &order).await;

            if mode.is_live() {
                match &result {
                    Ok(_) => self.breaker.record_success(),
                    Err(_) => self.breaker.record_failure(),
                }
            }
            result
        };
        // 熔断器打开后停止重试
        let retry_condition = |_e: &anyhow::Error| {
            !(self.mode.current().is_live() && self.breaker.state() == CircuitState::Open)
        };

        let result = RetryIf::spawn(strategy, attempt, retry_condition).await;

        match result {
            Ok(placed) => {
                self.order_tracker.track(&placed).await;
                if placed.status == OrderStatus::Filled {
                    self.position_tracker
                        .apply_fill(&placed, placed.filled_quantity, placed.filled_price)
                        .await;
                }
                Ok(placed)
            }
            Err(e) => {
                if self.breaker.state() == CircuitState::Open {
                    self.force_paper_fallback("circuit breaker opened during retries")
                        .await;
                }
                Err(e)
            }
        }
    }

    async fn submit_via(&self, adapter: &dyn ExecutionAdapter, order: &Order) -> Result<Order> {
        info!(
            "提交订单: adapter={}, symbol={}, side={}, type={}, qty={}",
            adapter.name(),
            order.symbol,
            order.side,
            order.order_type,
            order.quantity
        );
        match order.order_type {
            OrderType::Market => adapter.place_market(order).await,
            OrderType::Limit => adapter.place_limit(order).await,
            OrderType::StopLoss => adapter.place_stop_loss(order).await,
        }
    }

    /// 撤单
    pub async fn cancel_order(&self, order: &Order) -> Result<Order> {
        let adapter = self.adapter_for_order(order);
        let canceled = adapter.cancel_order(order).await?;
        if let Some(id) = canceled.exchange_order_id.as_deref() {
            self.order_tracker
                .apply_update(id, OrderStatus::Canceled, 0.0, 0.0, canceled.commission)
                .await;
        }
        Ok(canceled)
    }

    /// 当前可用余额（按当前模式的适配器）
    pub async fn get_balance(&self) -> Result<f64> {
        let adapter = self.adapter_for(self.mode.current());
        adapter.get_balance().await
    }

    /// 挂单状态同步循环的单次迭代：逐个查询活跃订单，推进状态机，
    /// 成交增量驱动持仓更新
    pub async fn sync_pending_orders(&self) {
        for order in self.order_tracker.pending_orders() {
            let adapter = self.adapter_for_order(&order);
            let updated = match adapter.query_order(&order).await {
                Ok(u) => u,
                Err(e) => {
                    warn!("订单查询失败: id={}, error={:?}", order.id, e);
                    continue;
                }
            };

            let Some(exchange_order_id) = updated.exchange_order_id.clone() else {
                continue;
            };

            if updated.status == order.status && updated.filled_quantity == order.filled_quantity {
                continue;
            }

            if let Some((fill_delta, tracked)) = self
                .order_tracker
                .apply_update(
                    &exchange_order_id,
                    updated.status,
                    updated.filled_quantity,
                    updated.filled_price,
                    updated.commission,
                )
                .await
            {
                if fill_delta > 0.0 {
                    self.position_tracker
                        .apply_fill(&tracked, fill_delta, tracked.filled_price)
                        .await;
                }
            }
        }
    }

    async fn force_paper_fallback(&self, reason: &str) {
        if self.mode.force_paper(reason) {
            let alert = RiskAlertEvent::new(
                "*",
                &format!("trading mode forced to paper: {}", reason),
                None,
            );
            if let Err(e) = self
                .bus
                .publish(topics::RISK_ALERTS, &BusEvent::RiskAlert(alert))
                .await
            {
                error!("risk-alerts发布失败: {:?}", e);
            }
        }
    }
}
