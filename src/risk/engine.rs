//! 风控引擎
//!
//! 消费trade-signals，按固定顺序执行检查，首个失败即短路
//! （顺序决定了拒绝原因的确定性，不允许重排）：
//! 1. kill-switch已触发
//! 2. 回撤达到kill条件
//! 3. 信号缺少止损
//! 4. 组合快照不可用（fail closed，状态未知不交易）
//! 5. 持仓数达到上限（仅开仓动作）
//! 6. 风险回报比低于下限（给了止盈才检查）
//! 7. 仓位计算结果≤0
//! 通过则发布approved-orders，拒绝则发布risk-alerts。
//!
//! 另有独立的组合监控循环：读快照 → 喂回撤监控 → 检查kill条件。

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::app_config::redis as app_redis;
use crate::app_config::settings::RiskSettings;
use crate::domain::enums::{OrderSide, OrderType};
use crate::domain::events::{BusEvent, KillSwitchEvent, RiskAlertEvent};
use crate::domain::order::Order;
use crate::domain::portfolio::PortfolioSnapshot;
use crate::domain::signal::{SignalAction, TradeSignal};
use crate::event_bus::{topics, EventBus};
use crate::risk::drawdown::DrawdownMonitor;
use crate::risk::kill_switch::KillSwitchManager;
use crate::risk::position_sizer::PositionSizer;

/// 稳定的拒绝原因字符串，对外契约，不要改动措辞
pub mod reasons {
    pub const KILL_SWITCH_ACTIVE: &str = "kill-switch active";
    pub const DRAWDOWN_LIMIT: &str = "drawdown limit breached";
    pub const MISSING_STOP_LOSS: &str = "signal missing stop-loss";
    pub const SNAPSHOT_UNAVAILABLE: &str = "portfolio snapshot unavailable";
    pub const MAX_POSITIONS: &str = "max open positions reached";
    pub const RISK_REWARD_TOO_LOW: &str = "risk/reward ratio below minimum";
    pub const POSITION_SIZE_INVALID: &str = "computed position size is zero or negative";
    pub const NO_ENTRY_PRICE: &str = "no entry price available";
}

/// 单个信号的评估结果，每个信号恰好一个，不存在部分通过
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvaluationResult {
    pub approved: bool,
    pub approved_order: Option<Order>,
    pub rejection_reason: Option<String>,
    pub metadata: HashMap<String, String>,
}

impl RiskEvaluationResult {
    fn rejected(reason: &str) -> Self {
        Self {
            approved: false,
            approved_order: None,
            rejection_reason: Some(reason.to_string()),
            metadata: HashMap::new(),
        }
    }

    fn approved(order: Order, metadata: HashMap<String, String>) -> Self {
        Self {
            approved: true,
            approved_order: Some(order),
            rejection_reason: None,
            metadata,
        }
    }
}

/// 最近处理过的信号id，持久化总线至少一次投递下用来去重
struct RecentSignals {
    order: VecDeque<String>,
    seen: HashSet<String>,
    capacity: usize,
}

impl RecentSignals {
    fn new(capacity: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(capacity),
            seen: HashSet::with_capacity(capacity),
            capacity,
        }
    }

    /// 第一次见到返回true并记录
    fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        if self.order.len() >= self.capacity {
            if let Some(evicted) = self.order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        self.order.push_back(id.to_string());
        self.seen.insert(id.to_string());
        true
    }
}

pub struct RiskEngine {
    settings: RiskSettings,
    sizer: PositionSizer,
    kill_switch: Arc<KillSwitchManager>,
    drawdown: Arc<DrawdownMonitor>,
    bus: Arc<dyn EventBus>,
    recent: Mutex<RecentSignals>,
}

impl RiskEngine {
    pub fn new(
        settings: RiskSettings,
        kill_switch: Arc<KillSwitchManager>,
        drawdown: Arc<DrawdownMonitor>,
        bus: Arc<dyn EventBus>,
    ) -> Self {
        Self {
            sizer: PositionSizer::new(settings.clone()),
            settings,
            kill_switch,
            drawdown,
            bus,
            recent: Mutex::new(RecentSignals::new(256)),
        }
    }

    /// 总线handler入口：去重、评估、发布结果
    pub async fn handle_signal(&self, signal: TradeSignal) {
        {
            let mut recent = self.recent.lock().unwrap();
            if !recent.insert(&signal.id) {
                // 重投的信号不再评估
                info!("重复信号忽略: id={}", signal.id);
                return;
            }
        }

        let result = self.evaluate_signal(&signal).await;
        if let Some(order) = result.approved_order.clone() {
            info!(
                "信号通过风控: id={}, symbol={}, qty={}",
                signal.id, signal.symbol, order.quantity
            );
            if let Err(e) = self
                .bus
                .publish(topics::APPROVED_ORDERS, &BusEvent::ApprovedOrder(order))
                .await
            {
                error!("approved-orders发布失败: {:?}", e);
            }
        } else {
            let reason = result.rejection_reason.clone().unwrap_or_default();
            warn!(
                "信号被风控拒绝: id={}, symbol={}, reason={}",
                signal.id, signal.symbol, reason
            );
            let alert = RiskAlertEvent::new(&signal.symbol, &reason, Some(signal.id.clone()));
            if let Err(e) = self
                .bus
                .publish(topics::RISK_ALERTS, &BusEvent::RiskAlert(alert))
                .await
            {
                error!("risk-alerts发布失败: {:?}", e);
            }
        }
    }

    /// 评估单个信号：从缓存取组合快照后执行检查链
    pub async fn evaluate_signal(&self, signal: &TradeSignal) -> RiskEvaluationResult {
        let snapshot = self.load_snapshot().await;
        self.evaluate_with_snapshot(signal, snapshot.as_ref())
    }

    /// 检查链本体。快照由调用方提供，便于测试
    pub fn evaluate_with_snapshot(
        &self,
        signal: &TradeSignal,
        snapshot: Option<&PortfolioSnapshot>,
    ) -> RiskEvaluationResult {
        // 1. kill-switch
        if self.kill_switch.is_active() {
            return RiskEvaluationResult::rejected(reasons::KILL_SWITCH_ACTIVE);
        }

        // 2. 回撤kill条件（即使开关尚未翻转也拒绝）
        let drawdown = self.drawdown.current_drawdown();
        if drawdown >= self.settings.max_drawdown_percent {
            return RiskEvaluationResult::rejected(reasons::DRAWDOWN_LIMIT);
        }

        // 3. 止损缺失。没有止损的信号直接拒绝，不补默认值
        let stop_loss = match signal.stop_loss {
            Some(v) => v,
            None => return RiskEvaluationResult::rejected(reasons::MISSING_STOP_LOSS),
        };

        // 4. 快照不可用即fail closed
        let snapshot = match snapshot {
            Some(s) => s,
            None => return RiskEvaluationResult::rejected(reasons::SNAPSHOT_UNAVAILABLE),
        };

        // 5. 持仓数上限只约束开仓
        if signal.action.is_opening()
            && snapshot.open_position_count() >= self.settings.max_open_positions
        {
            return RiskEvaluationResult::rejected(reasons::MAX_POSITIONS);
        }

        // 入场参考价：信号价优先，市价信号用快照内同品种现价
        let entry_price = match signal.price.or_else(|| {
            snapshot
                .positions
                .iter()
                .find(|p| p.symbol == signal.symbol)
                .map(|p| p.current_price)
        }) {
            Some(p) if p > 0.0 => p,
            _ => return RiskEvaluationResult::rejected(reasons::NO_ENTRY_PRICE),
        };

        // 6. 风险回报比
        if let Some(take_profit) = signal.take_profit {
            let stop_distance = (entry_price - stop_loss).abs();
            if stop_distance <= 0.0 {
                return RiskEvaluationResult::rejected(reasons::POSITION_SIZE_INVALID);
            }
            let ratio = (take_profit - entry_price).abs() / stop_distance;
            if ratio < self.settings.min_risk_reward_ratio {
                return RiskEvaluationResult::rejected(reasons::RISK_REWARD_TOO_LOW);
            }
        }

        // 7. 仓位计算
        let quantity = match self.sizer.calculate(
            snapshot.total_equity,
            entry_price,
            stop_loss,
            self.settings.max_risk_percent,
        ) {
            Some(q) => q,
            None => return RiskEvaluationResult::rejected(reasons::POSITION_SIZE_INVALID),
        };

        // 构建订单：平仓动作映射到反向，给了价格用限价
        let side = match signal.action {
            SignalAction::Buy => OrderSide::Buy,
            SignalAction::Sell => OrderSide::Sell,
            SignalAction::CloseLong => OrderSide::Sell,
            SignalAction::CloseShort => OrderSide::Buy,
        };
        let order_type = if signal.price.is_some() {
            OrderType::Limit
        } else {
            OrderType::Market
        };

        let order = match Order::new(
            &signal.symbol,
            side,
            order_type,
            quantity,
            signal.price,
            Some(stop_loss),
        ) {
            Ok(o) => o,
            Err(e) => {
                warn!("订单构建失败: {:?}", e);
                return RiskEvaluationResult::rejected(reasons::POSITION_SIZE_INVALID);
            }
        };

        let mut metadata = HashMap::new();
        metadata.insert("equity".to_string(), snapshot.total_equity.to_string());
        metadata.insert("drawdown_percent".to_string(), drawdown.to_string());
        metadata.insert("entry_price".to_string(), entry_price.to_string());
        metadata.insert("signal_id".to_string(), signal.id.clone());
        metadata.insert("strategy".to_string(), signal.strategy_name.clone());

        RiskEvaluationResult::approved(order, metadata)
    }

    /// 组合监控循环的单次迭代：快照 → 回撤 → kill条件
    pub async fn monitor_once(&self) {
        let snapshot = match self.load_snapshot().await {
            Some(s) => s,
            None => {
                warn!("组合监控: 快照不可用，本轮跳过");
                return;
            }
        };

        let drawdown = self.drawdown.update(snapshot.total_equity);

        if let Some(reason) = self.kill_switch.check_conditions(drawdown) {
            let event = KillSwitchEvent {
                is_active: true,
                reason: reason.clone(),
                drawdown_percent: drawdown,
                timestamp: chrono::Utc::now(),
            };
            if let Err(e) = self
                .bus
                .publish(topics::KILL_SWITCH, &BusEvent::KillSwitch(event))
                .await
            {
                error!("kill-switch事件发布失败: {:?}", e);
            }
        }
    }

    async fn load_snapshot(&self) -> Option<PortfolioSnapshot> {
        match app_redis::get_string(&app_redis::portfolio_snapshot_key()).await {
            Ok(Some(payload)) => match serde_json::from_str(&payload) {
                Ok(s) => Some(s),
                Err(e) => {
                    warn!("快照解析失败: {:?}", e);
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                warn!("快照读取失败: {:?}", e);
                None
            }
        }
    }
}
