//! 行情接入服务
//!
//! provider选择状态机：Primary(流式) → 连续N次失败 → Fallback(轮询)
//! → 连续2N次失败 → Degraded(只剩缓存里的最后已知数据)。
//! 任何一次成功都清零失败计数，下个周期回到Primary。
//! 每条tick发布到market-ticks，同时写入最新价缓存（短TTL，
//! 下游通过key缺失识别数据过期）。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::app_config::redis as app_redis;
use crate::app_config::settings::MarketSettings;
use crate::domain::events::{BusEvent, HealthEvent, HealthStatus};
use crate::domain::tick::Tick;
use crate::event_bus::{topics, EventBus};
use crate::market::rest_poller::RestPoller;

/// provider选择状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderState {
    Primary,
    Fallback,
    Degraded,
}

/// 状态迁移，每次迁移只发布一次健康事件
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    ToFallback,
    ToDegraded,
    Recovered,
}

/// 失败计数与provider选择，纯状态机，不做IO
pub struct ProviderCascade {
    failure_threshold: u32,
    consecutive_failures: u32,
    state: ProviderState,
}

impl ProviderCascade {
    pub fn new(failure_threshold: u32) -> Self {
        Self {
            failure_threshold: failure_threshold.max(1),
            consecutive_failures: 0,
            state: ProviderState::Primary,
        }
    }

    pub fn state(&self) -> ProviderState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    /// 成功：计数清零，下个周期回到Primary
    pub fn record_success(&mut self) -> Option<Transition> {
        self.consecutive_failures = 0;
        if self.state != ProviderState::Primary {
            self.state = ProviderState::Primary;
            return Some(Transition::Recovered);
        }
        None
    }

    /// 失败：计数累加，达到阈值时降级
    pub fn record_failure(&mut self) -> Option<Transition> {
        self.consecutive_failures += 1;
        match self.state {
            ProviderState::Primary if self.consecutive_failures >= self.failure_threshold => {
                self.state = ProviderState::Fallback;
                Some(Transition::ToFallback)
            }
            ProviderState::Fallback
                if self.consecutive_failures >= self.failure_threshold * 2 =>
            {
                self.state = ProviderState::Degraded;
                Some(Transition::ToDegraded)
            }
            _ => None,
        }
    }
}

/// 行情接入服务
pub struct MarketDataService {
    bus: Arc<dyn EventBus>,
    poller: RestPoller,
    settings: MarketSettings,
    symbols: Vec<String>,
}

impl MarketDataService {
    pub fn new(
        bus: Arc<dyn EventBus>,
        poller: RestPoller,
        settings: MarketSettings,
        symbols: Vec<String>,
    ) -> Self {
        Self {
            bus,
            poller,
            settings,
            symbols,
        }
    }

    /// 接入主循环。stream_rx是流式provider的tick通道
    pub async fn run(&self, mut stream_rx: mpsc::Receiver<Tick>, shutdown: Arc<AtomicBool>) {
        let mut cascade = ProviderCascade::new(self.settings.failure_threshold);
        info!("行情接入启动: symbols={:?}", self.symbols);

        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            let transition = match cascade.state() {
                ProviderState::Primary => {
                    match tokio::time::timeout(self.settings.stream_read_timeout, stream_rx.recv())
                        .await
                    {
                        Ok(Some(tick)) => {
                            self.handle_tick(&tick).await;
                            cascade.record_success()
                        }
                        Ok(None) => {
                            warn!("流式provider通道关闭");
                            cascade.record_failure()
                        }
                        Err(_) => {
                            warn!(
                                "流式provider读取超时: 连续失败{}次",
                                cascade.consecutive_failures() + 1
                            );
                            cascade.record_failure()
                        }
                    }
                }
                ProviderState::Fallback => {
                    let transition = match self.poller.fetch_ticks(&self.symbols).await {
                        Ok(ticks) => {
                            for tick in &ticks {
                                self.handle_tick(tick).await;
                            }
                            cascade.record_success()
                        }
                        Err(e) => {
                            warn!("轮询provider失败: {:?}", e);
                            cascade.record_failure()
                        }
                    };
                    tokio::time::sleep(self.settings.poll_interval).await;
                    transition
                }
                ProviderState::Degraded => {
                    // 不再产出新数据，缓存TTL过期即表示数据陈旧；
                    // 周期性探测provider是否恢复
                    tokio::time::sleep(self.settings.degraded_retry_interval).await;

                    if let Ok(tick) = stream_rx.try_recv() {
                        self.handle_tick(&tick).await;
                        cascade.record_success()
                    } else {
                        match self.poller.fetch_ticks(&self.symbols).await {
                            Ok(ticks) => {
                                for tick in &ticks {
                                    self.handle_tick(tick).await;
                                }
                                cascade.record_success()
                            }
                            Err(_) => None,
                        }
                    }
                }
            };

            if let Some(t) = transition {
                self.publish_transition(t).await;
            }
        }

        info!("行情接入退出");
    }

    /// tick处理：发布到总线 + 写入最新价缓存
    async fn handle_tick(&self, tick: &Tick) {
        if let Err(e) = self
            .bus
            .publish(topics::MARKET_TICKS, &BusEvent::Tick(tick.clone()))
            .await
        {
            error!("tick发布失败: symbol={}, error={:?}", tick.symbol, e);
        }

        let ttl = app_redis::tick_ttl_secs();
        if let Err(e) = app_redis::set_with_ttl(
            &app_redis::latest_price_key(&tick.symbol),
            &tick.price.to_string(),
            ttl,
        )
        .await
        {
            warn!("最新价缓存写入失败: symbol={}, error={:?}", tick.symbol, e);
        }

        match serde_json::to_string(tick) {
            Ok(payload) => {
                if let Err(e) =
                    app_redis::set_with_ttl(&app_redis::latest_tick_key(&tick.symbol), &payload, ttl)
                        .await
                {
                    warn!("最新tick缓存写入失败: symbol={}, error={:?}", tick.symbol, e);
                }
            }
            Err(e) => warn!("tick序列化失败: {:?}", e),
        }
    }

    async fn publish_transition(&self, transition: Transition) {
        let event = match transition {
            Transition::ToFallback => {
                warn!("行情接入降级: 流式provider切换到轮询provider");
                HealthEvent::new(
                    "market-data",
                    HealthStatus::Degraded,
                    "streaming provider failed, polling fallback engaged",
                )
            }
            Transition::ToDegraded => {
                error!("行情接入进一步降级: 只剩最后已知数据");
                HealthEvent::new(
                    "market-data",
                    HealthStatus::Degraded,
                    "all providers failed, serving stale data",
                )
            }
            Transition::Recovered => {
                info!("行情接入恢复: 回到流式provider");
                HealthEvent::new("market-data", HealthStatus::Healthy, "provider recovered")
            }
        };

        if let Err(e) = self
            .bus
            .publish(topics::SYSTEM_HEALTH, &BusEvent::SystemHealth(event))
            .await
        {
            error!("健康事件发布失败: {:?}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cascade_falls_back_after_n_failures() {
        let mut cascade = ProviderCascade::new(3);
        assert_eq!(cascade.state(), ProviderState::Primary);

        assert_eq!(cascade.record_failure(), None);
        assert_eq!(cascade.record_failure(), None);
        assert_eq!(cascade.record_failure(), Some(Transition::ToFallback));
        assert_eq!(cascade.state(), ProviderState::Fallback);
    }

    #[test]
    fn test_cascade_degrades_at_double_threshold() {
        let mut cascade = ProviderCascade::new(2);
        cascade.record_failure();
        assert_eq!(cascade.record_failure(), Some(Transition::ToFallback));
        cascade.record_failure();
        assert_eq!(cascade.record_failure(), Some(Transition::ToDegraded));
        assert_eq!(cascade.state(), ProviderState::Degraded);
    }

    #[test]
    fn test_success_resets_counter_and_returns_primary() {
        let mut cascade = ProviderCascade::new(2);
        cascade.record_failure();
        cascade.record_failure();
        assert_eq!(cascade.state(), ProviderState::Fallback);

        assert_eq!(cascade.record_success(), Some(Transition::Recovered));
        assert_eq!(cascade.state(), ProviderState::Primary);
        assert_eq!(cascade.consecutive_failures(), 0);
    }

    #[test]
    fn test_transition_fires_once_not_per_retry() {
        let mut cascade = ProviderCascade::new(2);
        cascade.record_failure();
        assert_eq!(cascade.record_failure(), Some(Transition::ToFallback));
        // 继续失败不再重复发ToFallback
        assert_eq!(cascade.record_failure(), None);
        assert_eq!(cascade.record_failure(), Some(Transition::ToDegraded));
        assert_eq!(cascade.record_failure(), None);
    }

    #[test]
    fn test_success_in_primary_is_silent() {
        let mut cascade = ProviderCascade::new(2);
        assert_eq!(cascade.record_success(), None);
    }
}
