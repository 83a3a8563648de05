//! 组合快照的持久化行，供事后分析与dashboard历史查询

use rbatis::crud;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::app_config::db;
use crate::domain::portfolio::PortfolioSnapshot;

/// table
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(rename_all = "snake_case")]
pub struct PortfolioSnapshotEntity {
    pub total_equity: f64,
    pub available_balance: f64,
    pub total_unrealized_pnl: f64,
    pub total_realized_pnl: f64,
    pub drawdown_percent: f64,
    pub position_count: i64,
    /// 毫秒时间戳
    pub created_at: i64,
}

crud!(PortfolioSnapshotEntity {}, "portfolio_snapshots");

impl From<&PortfolioSnapshot> for PortfolioSnapshotEntity {
    fn from(snapshot: &PortfolioSnapshot) -> Self {
        Self {
            total_equity: snapshot.total_equity,
            available_balance: snapshot.available_balance,
            total_unrealized_pnl: snapshot.total_unrealized_pnl,
            total_realized_pnl: snapshot.total_realized_pnl,
            drawdown_percent: snapshot.drawdown_percent,
            position_count: snapshot.positions.len() as i64,
            created_at: snapshot.timestamp.timestamp_millis(),
        }
    }
}

/// 把快照落库。未配置数据库时为空操作
pub async fn record(snapshot: &PortfolioSnapshot) {
    let Some(rb) = db::try_get_db_client() else {
        debug!("数据库未配置，快照持久化跳过");
        return;
    };

    let entity = PortfolioSnapshotEntity::from(snapshot);
    if let Err(e) = PortfolioSnapshotEntity::insert(rb, &entity).await {
        warn!("快照持久化失败: {:?}", e);
    }
}
