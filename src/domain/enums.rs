//! 通用枚举定义

use std::fmt;

use serde::{Deserialize, Serialize};

/// 订单方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// 订单类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    /// 市价单
    Market,
    /// 限价单
    Limit,
    /// 止损单
    StopLoss,
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit => write!(f, "LIMIT"),
            OrderType::StopLoss => write!(f, "STOP_LOSS"),
        }
    }
}

/// 订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// 新建，已提交未成交
    New,
    /// 部分成交
    PartiallyFilled,
    /// 全部成交（终态）
    Filled,
    /// 已撤销（终态）
    Canceled,
    /// 被拒绝（终态）
    Rejected,
    /// 已过期（终态）
    Expired,
}

impl OrderStatus {
    /// 是否终态。进入终态后订单从活跃集合移除，只保留在流水中
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::New => "NEW",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Canceled => "CANCELED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
        };
        write!(f, "{}", s)
    }
}

/// 持仓方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// 获取平仓方向
    pub fn close_side(&self) -> OrderSide {
        match self {
            PositionSide::Long => OrderSide::Sell,
            PositionSide::Short => OrderSide::Buy,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "LONG"),
            PositionSide::Short => write!(f, "SHORT"),
        }
    }
}

/// 交易模式。Live之外的模式都走Paper适配器
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradingMode {
    Live,
    Paper,
    Backtest,
    Simulation,
}

impl TradingMode {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "live" => TradingMode::Live,
            "backtest" => TradingMode::Backtest,
            "simulation" => TradingMode::Simulation,
            _ => TradingMode::Paper,
        }
    }

    /// 是否使用真实交易所下单
    pub fn is_live(&self) -> bool {
        matches!(self, TradingMode::Live)
    }
}

impl fmt::Display for TradingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TradingMode::Live => "LIVE",
            TradingMode::Paper => "PAPER",
            TradingMode::Backtest => "BACKTEST",
            TradingMode::Simulation => "SIMULATION",
        };
        write!(f, "{}", s)
    }
}

/// 事件总线模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusMode {
    /// 进程内总线，单进程部署
    InProcess,
    /// Redis Streams持久化总线，多进程部署
    RedisStream,
}

impl BusMode {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "redis" | "redis-stream" | "stream" => BusMode::RedisStream,
            _ => BusMode::InProcess,
        }
    }
}
