//! 交易所REST/WS接口的DTO定义，交易所返回的数值一律是字符串

use serde::{Deserialize, Serialize};

use crate::domain::enums::OrderStatus;
use crate::domain::tick::Tick;

/// 通用响应信封
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub code: String,
    pub msg: String,
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// ticker行情
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickerDto {
    pub inst_id: String,
    /// 最新成交价
    pub last: String,
    /// 最新成交量
    pub last_sz: String,
    pub bid_px: String,
    pub ask_px: String,
    pub ts: String,
}

impl TickerDto {
    /// 转成内部Tick，任一字段解析失败返回None
    pub fn to_tick(&self) -> Option<Tick> {
        Some(Tick::new(
            &self.inst_id,
            self.last.parse().ok()?,
            self.last_sz.parse().unwrap_or(0.0),
            self.bid_px.parse().ok()?,
            self.ask_px.parse().ok()?,
        ))
    }
}

/// K线数据，交易所返回 [ts, o, h, l, c, vol, volCcy] 数组
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleDto {
    pub ts: String,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

impl CandleDto {
    pub fn from_vec(v: Vec<String>) -> Option<Self> {
        if v.len() < 6 {
            return None;
        }
        Some(Self {
            ts: v[0].clone(),
            open: v[1].clone(),
            high: v[2].clone(),
            low: v[3].clone(),
            close: v[4].clone(),
            volume: v[5].clone(),
        })
    }
}

/// 账户余额（签名接口）
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountBalanceDto {
    /// 总权益
    pub total_eq: String,
    /// 可用余额
    pub avail_bal: String,
}

/// 下单请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderReqDto {
    pub inst_id: String,
    /// 本地订单ID，回传用于幂等对账
    pub cl_ord_id: String,
    /// buy / sell
    pub side: String,
    /// market / limit / conditional
    pub ord_type: String,
    /// 数量
    pub sz: String,
    /// 限价单价格
    #[serde(skip_serializing_if = "Option::is_none")]
    pub px: Option<String>,
    /// 止损触发价
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger_px: Option<String>,
}

/// 下单回执
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderAckDto {
    pub ord_id: String,
    pub cl_ord_id: String,
    pub s_code: String,
    pub s_msg: String,
}

/// 撤单回执
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelAckDto {
    pub ord_id: String,
    pub s_code: String,
}

/// 订单详情
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderDetailDto {
    pub ord_id: String,
    pub inst_id: String,
    /// live / partially_filled / filled / canceled / rejected / expired
    pub state: String,
    /// 累计成交数量
    pub acc_fill_sz: String,
    /// 成交均价
    pub avg_px: String,
    /// 手续费
    pub fee: String,
}

impl OrderDetailDto {
    /// 交易所状态映射到内部状态机，未知状态返回None由调用方告警
    pub fn to_status(&self) -> Option<OrderStatus> {
        match self.state.as_str() {
            "live" => Some(OrderStatus::New),
            "partially_filled" => Some(OrderStatus::PartiallyFilled),
            "filled" => Some(OrderStatus::Filled),
            "canceled" => Some(OrderStatus::Canceled),
            "rejected" => Some(OrderStatus::Rejected),
            "expired" => Some(OrderStatus::Expired),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticker_to_tick() {
        let dto = TickerDto {
            inst_id: "BTC-USDT".to_string(),
            last: "50000.5".to_string(),
            last_sz: "0.2".to_string(),
            bid_px: "50000.0".to_string(),
            ask_px: "50001.0".to_string(),
            ts: "1700000000000".to_string(),
        };
        let tick = dto.to_tick().unwrap();
        assert_eq!(tick.symbol, "BTC-USDT");
        assert_eq!(tick.price, 50000.5);
    }

    #[test]
    fn test_ticker_with_bad_price_is_none() {
        let dto = TickerDto {
            inst_id: "BTC-USDT".to_string(),
            last: "not-a-number".to_string(),
            last_sz: "0".to_string(),
            bid_px: "1".to_string(),
            ask_px: "2".to_string(),
            ts: "0".to_string(),
        };
        assert!(dto.to_tick().is_none());
    }

    #[test]
    fn test_order_state_mapping() {
        let mut dto = OrderDetailDto {
            ord_id: "1".to_string(),
            inst_id: "BTC-USDT".to_string(),
            state: "filled".to_string(),
            acc_fill_sz: "0.1".to_string(),
            avg_px: "50000".to_string(),
            fee: "0.05".to_string(),
        };
        assert_eq!(dto.to_status(), Some(OrderStatus::Filled));
        dto.state = "weird".to_string();
        assert_eq!(dto.to_status(), None);
    }
}
