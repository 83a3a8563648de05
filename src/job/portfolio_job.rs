//! 组合快照重建任务
//!
//! 固定间隔全量重建：取余额 → 按缓存最新价重估持仓 → 组装快照
//! → 写缓存（~60秒TTL）→ 落库。未实现盈亏只在这里重算，不逐tick更新。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::app_config::redis as app_redis;
use crate::execution::{ExecutionEngine, PositionTracker};
use crate::model::portfolio_snapshot;
use crate::risk::DrawdownMonitor;

pub struct PortfolioJob {
    engine: Arc<ExecutionEngine>,
    position_tracker: Arc<PositionTracker>,
    drawdown: Arc<DrawdownMonitor>,
}

impl PortfolioJob {
    pub fn new(
        engine: Arc<ExecutionEngine>,
        position_tracker: Arc<PositionTracker>,
        drawdown: Arc<DrawdownMonitor>,
    ) -> Self {
        Self {
            engine,
            position_tracker,
            drawdown,
        }
    }

    /// 单次重建。余额取不到时不写快照：宁可让快照过期，
    /// 风控fail closed，也不发布一份猜出来的快照
    pub async fn run_once(&self) {
        let balance = match self.engine.get_balance().await {
            Ok(b) => b,
            Err(e) => {
                warn!("余额查询失败，本轮快照跳过: {:?}", e);
                return;
            }
        };

        self.position_tracker.refresh_prices().await;

        let snapshot = self
            .position_tracker
            .build_snapshot(balance, self.drawdown.current_drawdown());

        match serde_json::to_string(&snapshot) {
            Ok(payload) => {
                if let Err(e) = app_redis::set_with_ttl(
                    &app_redis::portfolio_snapshot_key(),
                    &payload,
                    app_redis::snapshot_ttl_secs(),
                )
                .await
                {
                    warn!("快照缓存写入失败: {:?}", e);
                }
            }
            Err(e) => warn!("快照序列化失败: {:?}", e),
        }

        portfolio_snapshot::record(&snapshot).await;
        debug!(
            "快照重建完成: equity={:.2}, positions={}, unrealized={:.2}",
            snapshot.total_equity,
            snapshot.open_position_count(),
            snapshot.total_unrealized_pnl
        );
    }
}
