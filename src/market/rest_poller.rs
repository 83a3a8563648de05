//! 轮询行情provider，流式provider连续失败后的降级路径

use std::sync::Arc;

use anyhow::{anyhow, Result};
use tracing::warn;

use crate::domain::tick::Tick;
use crate::exchange::ExchangeClient;

pub struct RestPoller {
    client: Arc<ExchangeClient>,
}

impl RestPoller {
    pub fn new(client: Arc<ExchangeClient>) -> Self {
        Self { client }
    }

    /// 逐个拉取各品种的最新ticker。部分失败只告警，
    /// 全部失败才算一次provider失败
    pub async fn fetch_ticks(&self, symbols: &[String]) -> Result<Vec<Tick>> {
        let mut ticks = Vec::with_capacity(symbols.len());

        for symbol in symbols {
            match self.client.get_ticker(symbol).await {
                Ok(dto) => match dto.to_tick() {
                    Some(tick) => ticks.push(tick),
                    None => warn!("ticker解析失败: {}", symbol),
                },
                Err(e) => warn!("拉取ticker失败: symbol={}, error={:?}", symbol, e),
            }
        }

        if ticks.is_empty() {
            return Err(anyhow!("轮询provider未取得任何行情"));
        }
        Ok(ticks)
    }
}
