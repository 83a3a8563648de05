//! Live适配器：经签名REST客户端对接真实交易所

use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::domain::enums::{OrderSide, OrderType};
use crate::domain::order::Order;
use crate::exchange::dto::PlaceOrderReqDto;
use crate::exchange::ExchangeClient;
use crate::execution::adapter::ExecutionAdapter;

pub struct LiveAdapter {
    client: Arc<ExchangeClient>,
}

impl LiveAdapter {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self { client }
    }

    fn build_request(order: &Order) -> PlaceOrderReqDto {
        let side = match order.side {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        };
        let ord_type = match order.order_type {
            OrderType::Market => "market",
            OrderType::Limit => "limit",
            OrderType::StopLoss => "conditional",
        };
        PlaceOrderReqDto {
            inst_id: order.symbol.clone(),
            cl_ord_id: order.id.replace('-', ""),
            side: side.to_string(),
            ord_type: ord_type.to_string(),
            sz: order.quantity.to_string(),
            px: order.price.map(|p| p.to_string()),
            trigger_px: order.stop_price.map(|p| p.to_string()),
        }
    }

    async fn submit(&self, order: &Order) -> Result<Order> {
        let req = Self::build_request(order);
        let ack = self.client.place_order(&req).await?;

        let mut placed = order.clone();
        // exchange_order_id只在提交成功后赋值
        placed.exchange_order_id = Some(ack.ord_id.clone());
        info!(
            "订单提交成功: symbol={}, ord_id={}, cl_ord_id={}",
            order.symbol, ack.ord_id, ack.cl_ord_id
        );
        Ok(placed)
    }
}

#[async_trait]
impl ExecutionAdapter for LiveAdapter {
    async fn place_market(&self, order: &Order) -> Result<Order> {
        self.submit(order).await
    }

    async fn place_limit(&self, order: &Order) -> Result<Order> {
        self.submit(order).await
    }

    async fn place_stop_loss(&self, order: &Order) -> Result<Order> {
        self.submit(order).await
    }

    async fn cancel_order(&self, order: &Order) -> Result<Order> {
        let exchange_order_id = order
            .exchange_order_id
            .as_deref()
            .ok_or_else(|| anyhow!("订单尚未提交，无法撤单: {}", order.id))?;

        let ack = self.client.cancel_order(&order.symbol, exchange_order_id).await?;
        if ack.s_code != "0" {
            return Err(anyhow!("撤单失败: ord_id={}, code={}", exchange_order_id, ack.s_code));
        }

        // 实际终态以随后的查询为准
        let mut canceled = order.clone();
        canceled.updated_at = chrono::Utc::now();
        Ok(canceled)
    }

    async fn query_order(&self, order: &Order) -> Result<Order> {
        let exchange_order_id = order
            .exchange_order_id
            .as_deref()
            .ok_or_else(|| anyhow!("订单尚未提交，无法查询: {}", order.id))?;

        let detail = self
            .client
            .get_order_detail(&order.symbol, exchange_order_id)
            .await?;

        let mut updated = order.clone();
        match detail.to_status() {
            Some(status) => {
                let filled_quantity = detail.acc_fill_sz.parse().unwrap_or(0.0);
                let filled_price = detail.avg_px.parse().unwrap_or(0.0);
                if let Err(e) = updated.apply_update(status, filled_quantity, filled_price) {
                    warn!("订单状态更新被拒: ord_id={}, error={:?}", exchange_order_id, e);
                }
                updated.commission = detail.fee.parse::<f64>().unwrap_or(0.0).abs();
            }
            None => {
                warn!(
                    "未知的交易所订单状态: ord_id={}, state={}",
                    exchange_order_id, detail.state
                );
            }
        }
        Ok(updated)
    }

    async fn get_balance(&self) -> Result<f64> {
        let balance = self.client.get_account_balance().await?;
        balance
            .avail_bal
            .parse::<f64>()
            .map_err(|e| anyhow!("余额解析失败: {} ({})", balance.avail_bal, e))
    }

    fn name(&self) -> &'static str {
        "live"
    }
}
