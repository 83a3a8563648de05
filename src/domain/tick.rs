use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 单个品种某一时刻的价格观测，不可变值对象，被同品种的下一条tick取代
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub price: f64,
    pub volume: f64,
    pub bid: f64,
    pub ask: f64,
    pub timestamp: DateTime<Utc>,
}

impl Tick {
    pub fn new(symbol: &str, price: f64, volume: f64, bid: f64, ask: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            price,
            volume,
            bid,
            ask,
            timestamp: Utc::now(),
        }
    }
}
