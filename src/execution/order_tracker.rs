//! 订单追踪
//!
//! 已提交订单进入内存活跃集合（按交易所订单ID索引），同时镜像到
//! 持久化流水和共享缓存。状态更新推动订单沿状态机流转；
//! 进入终态后移出活跃集合（流水保留）并缩短缓存TTL。
//! 未知订单ID的状态更新记告警后跳过，不中断循环。

use dashmap::DashMap;
use tracing::{info, warn};

use crate::app_config::redis as app_redis;
use crate::domain::enums::OrderStatus;
use crate::domain::order::Order;
use crate::model::order_history;

/// 终态订单缓存key保留的秒数
const TERMINAL_TTL_SECS: i64 = 30;

pub struct OrderTracker {
    /// 活跃订单集合，key为exchange_order_id
    pending: DashMap<String, Order>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self {
            pending: DashMap::new(),
        }
    }

    /// 记录新提交的订单：活跃集合 + 流水 + 缓存
    pub async fn track(&self, order: &Order) {
        let Some(exchange_order_id) = order.exchange_order_id.clone() else {
            warn!("订单缺少exchange_order_id，不进入追踪: {}", order.id);
            return;
        };

        if !order.is_terminal() {
            self.pending.insert(exchange_order_id.clone(), order.clone());
        }

        order_history::record(order).await;
        self.mirror_to_cache(order, &exchange_order_id).await;
        info!(
            "订单进入追踪: ord_id={}, symbol={}, status={}",
            exchange_order_id, order.symbol, order.status
        );

        // paper市价单会以Filled状态直接到达这里
        if order.is_terminal() {
            self.shorten_cache_ttl(&exchange_order_id).await;
        }
    }

    /// 应用一次状态更新。返回(成交增量, 更新后的订单)。
    /// 未知ID返回None（状态不一致，告警后跳过）
    pub async fn apply_update(
        &self,
        exchange_order_id: &str,
        status: OrderStatus,
        filled_quantity: f64,
        filled_price: f64,
        commission: f64,
    ) -> Option<(f64, Order)> {
        let updated = {
            let mut entry = match self.pending.get_mut(exchange_order_id) {
                Some(e) => e,
                None => {
                    warn!("收到未知订单的状态更新: ord_id={}", exchange_order_id);
                    return None;
                }
            };

            let previous_filled = entry.filled_quantity;
            if let Err(e) = entry.apply_update(status, filled_quantity, filled_price) {
                warn!("订单状态更新被拒: ord_id={}, error={:?}", exchange_order_id, e);
                return None;
            }
            entry.commission = commission.max(entry.commission);
            let fill_delta = (entry.filled_quantity - previous_filled).max(0.0);
            (fill_delta, entry.clone())
        };

        let (fill_delta, order) = updated;
        order_history::record(&order).await;
        self.mirror_to_cache(&order, exchange_order_id).await;

        if order.is_terminal() {
            // 终态移出活跃集合，流水保留
            self.pending.remove(exchange_order_id);
            self.shorten_cache_ttl(exchange_order_id).await;
            info!(
                "订单进入终态: ord_id={}, status={}, filled={}",
                exchange_order_id, order.status, order.filled_quantity
            );
        }

        Some((fill_delta, order))
    }

    /// 当前活跃订单快照
    pub fn pending_orders(&self) -> Vec<Order> {
        self.pending.iter().map(|e| e.value().clone()).collect()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn contains(&self, exchange_order_id: &str) -> bool {
        self.pending.contains_key(exchange_order_id)
    }

    async fn mirror_to_cache(&self, order: &Order, exchange_order_id: &str) {
        match serde_json::to_string(order) {
            Ok(payload) => {
                if let Err(e) = app_redis::set_with_ttl(
                    &app_redis::active_order_key(exchange_order_id),
                    &payload,
                    app_redis::order_ttl_secs(),
                )
                .await
                {
                    warn!("订单缓存镜像失败: ord_id={}, error={:?}", exchange_order_id, e);
                }
            }
            Err(e) => warn!("订单序列化失败: {:?}", e),
        }
    }

    async fn shorten_cache_ttl(&self, exchange_order_id: &str) {
        if let Err(e) = app_redis::shorten_ttl(
            &app_redis::active_order_key(exchange_order_id),
            TERMINAL_TTL_SECS,
        )
        .await
        {
            warn!("订单缓存TTL缩短失败: ord_id={}, error={:?}", exchange_order_id, e);
        }
    }
}

impl Default for OrderTracker {
    fn default() -> Self {
        Self::new()
    }
}
