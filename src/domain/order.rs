//! 订单实体与状态机

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::enums::{OrderSide, OrderStatus, OrderType};

#[derive(Error, Debug)]
pub enum OrderError {
    /// 终态订单不允许再变更
    #[error("订单已进入终态: {0}")]
    AlreadyTerminal(OrderStatus),

    #[error("订单参数无效: {0}")]
    InvalidParameter(String),
}

/// 订单实体，生命周期由执行引擎管理
///
/// 状态机: New → {PartiallyFilled} → {Filled, Canceled, Rejected, Expired}
/// exchange_order_id 只在提交成功后由交易所分配
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// 本地订单ID
    pub id: String,

    /// 交易所订单ID
    pub exchange_order_id: Option<String>,

    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,

    /// 下单数量
    pub quantity: f64,

    /// 限价单价格
    pub price: Option<f64>,

    /// 止损单触发价
    pub stop_price: Option<f64>,

    pub status: OrderStatus,

    /// 已成交数量
    pub filled_quantity: f64,

    /// 成交均价
    pub filled_price: f64,

    /// 手续费
    pub commission: f64,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
        stop_price: Option<f64>,
    ) -> Result<Self, OrderError> {
        if quantity <= 0.0 {
            return Err(OrderError::InvalidParameter(format!(
                "下单数量必须为正数: {}",
                quantity
            )));
        }
        if order_type == OrderType::Limit && price.is_none() {
            return Err(OrderError::InvalidParameter("限价单缺少价格".to_string()));
        }
        if order_type == OrderType::StopLoss && stop_price.is_none() {
            return Err(OrderError::InvalidParameter("止损单缺少触发价".to_string()));
        }

        let now = Utc::now();
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            exchange_order_id: None,
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price,
            stop_price,
            status: OrderStatus::New,
            filled_quantity: 0.0,
            filled_price: 0.0,
            commission: 0.0,
            created_at: now,
            updated_at: now,
        })
    }

    /// 是否已进入终态
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// 应用一次状态更新。终态订单拒绝更新
    pub fn apply_update(
        &mut self,
        status: OrderStatus,
        filled_quantity: f64,
        filled_price: f64,
    ) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::AlreadyTerminal(self.status));
        }
        self.status = status;
        if filled_quantity > 0.0 {
            self.filled_quantity = filled_quantity;
            self.filled_price = filled_price;
        }
        self.updated_at = Utc::now();
        Ok(())
    }

    /// 标记全部成交
    pub fn mark_filled(&mut self, price: f64, commission: f64) -> Result<(), OrderError> {
        if self.is_terminal() {
            return Err(OrderError::AlreadyTerminal(self.status));
        }
        self.status = OrderStatus::Filled;
        self.filled_quantity = self.quantity;
        self.filled_price = price;
        self.commission += commission;
        self.updated_at = Utc::now();
        Ok(())
    }
}
