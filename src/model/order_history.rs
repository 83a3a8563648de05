//! 订单流水（持久化trade journal）
//!
//! 追加写：订单每次状态变化落一行，终态订单从活跃集合移除后流水仍保留。
//! 支持按时间范围、品种、状态查询。

use rbatis::{crud, RBatis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app_config::db;
use crate::domain::order::Order;

/// table
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct OrderHistoryEntity {
    pub order_id: String,
    pub exchange_order_id: Option<String>,
    pub symbol: String,
    pub side: String,
    pub order_type: String,
    pub status: String,
    pub quantity: f64,
    pub price: Option<f64>,
    pub stop_price: Option<f64>,
    pub filled_quantity: f64,
    pub filled_price: f64,
    pub commission: f64,
    /// 毫秒时间戳
    pub created_at: i64,
    pub updated_at: i64,
}

crud!(OrderHistoryEntity {}, "order_history");

impl From<&Order> for OrderHistoryEntity {
    fn from(order: &Order) -> Self {
        Self {
            order_id: order.id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side.to_string(),
            order_type: order.order_type.to_string(),
            status: order.status.to_string(),
            quantity: order.quantity,
            price: order.price,
            stop_price: order.stop_price,
            filled_quantity: order.filled_quantity,
            filled_price: order.filled_price,
            commission: order.commission,
            created_at: order.created_at.timestamp_millis(),
            updated_at: order.updated_at.timestamp_millis(),
        }
    }
}

pub struct OrderHistoryModel {
    db: &'static RBatis,
}

impl OrderHistoryModel {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            db: db::get_db_client()?,
        })
    }

    pub async fn add(&self, entity: &OrderHistoryEntity) -> anyhow::Result<()> {
        OrderHistoryEntity::insert(self.db, entity).await?;
        Ok(())
    }

    /// 按时间范围/品种/状态查询流水
    pub async fn query(
        &self,
        symbol: Option<&str>,
        status: Option<&str>,
        begin_ts: i64,
        end_ts: i64,
        limit: u32,
    ) -> anyhow::Result<Vec<OrderHistoryEntity>> {
        let mut sql = format!(
            "SELECT * FROM order_history WHERE updated_at >= {} AND updated_at <= {}",
            begin_ts, end_ts
        );
        if let Some(symbol) = symbol {
            sql.push_str(&format!(" AND symbol = '{}'", symbol.replace('\'', "")));
        }
        if let Some(status) = status {
            sql.push_str(&format!(" AND status = '{}'", status.replace('\'', "")));
        }
        sql.push_str(&format!(" ORDER BY updated_at DESC LIMIT {}", limit));

        let results: Vec<OrderHistoryEntity> = self.db.query_decode(&sql, vec![]).await?;
        Ok(results)
    }
}

/// 把订单的当前状态落一行流水。未配置数据库时为空操作
pub async fn record(order: &Order) {
    let Some(rb) = db::try_get_db_client() else {
        debug!("数据库未配置，订单流水跳过: {}", order.id);
        return;
    };

    let entity = OrderHistoryEntity::from(order);
    if let Err(e) = OrderHistoryEntity::insert(rb, &entity).await {
        warn!("订单流水写入失败: id={}, error={:?}", order.id, e);
    }
}
