use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 信号动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalAction {
    Buy,
    Sell,
    CloseLong,
    CloseShort,
}

impl SignalAction {
    /// 是否为开仓动作（持仓数限制只对开仓生效）
    pub fn is_opening(&self) -> bool {
        matches!(self, SignalAction::Buy | SignalAction::Sell)
    }
}

/// 策略产出的交易信号，尚未经过风控。由风控引擎消费一次
///
/// 不变量：缺少stop_loss的信号必须被拒绝，永远不会补默认值
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSignal {
    pub id: String,
    pub symbol: String,
    pub action: SignalAction,
    /// 期望价格。给了价格下限价单，没给下市价单
    pub price: Option<f64>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub strategy_name: String,
    /// 策略给出的信号置信度（0.0 ~ 1.0）
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: String,
}

impl TradeSignal {
    pub fn new(symbol: &str, action: SignalAction, strategy_name: &str) -> Self {
        let id = uuid::Uuid::new_v4().to_string();
        Self {
            correlation_id: id.clone(),
            id,
            symbol: symbol.to_string(),
            action,
            price: None,
            stop_loss: None,
            take_profit: None,
            strategy_name: strategy_name.to_string(),
            confidence: 1.0,
            timestamp: Utc::now(),
        }
    }

    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    pub fn with_stop_loss(mut self, stop_loss: f64) -> Self {
        self.stop_loss = Some(stop_loss);
        self
    }

    pub fn with_take_profit(mut self, take_profit: f64) -> Self {
        self.take_profit = Some(take_profit);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}
