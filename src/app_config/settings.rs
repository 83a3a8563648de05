//! 核心配置面：风控参数、重试参数、熔断参数、交易品种与交易模式
//!
//! 全部来自环境变量（dotenv在main中加载），集中到一个结构体注入各组件，
//! 便于测试时构造隔离实例。

use std::time::Duration;

use crate::app_config::env::{env_f64, env_list, env_or_default, env_u64};
use crate::domain::enums::{BusMode, TradingMode};

/// 风控配置
#[derive(Debug, Clone)]
pub struct RiskSettings {
    /// 单笔最大风险比例（%）
    pub max_risk_percent: f64,
    /// 最大回撤比例（%），超过触发kill-switch
    pub max_drawdown_percent: f64,
    /// 最小风险回报比
    pub min_risk_reward_ratio: f64,
    /// 最大同时持仓数
    pub max_open_positions: usize,
    /// 最小下单数量
    pub min_order_size: f64,
    /// 最大下单数量
    pub max_order_size: f64,
    /// 数量精度（小数位）
    pub quantity_precision: u32,
}

/// 熔断器配置
#[derive(Debug, Clone)]
pub struct BreakerSettings {
    /// 触发熔断的失败率（0.0 ~ 1.0）
    pub failure_ratio: f64,
    /// 统计窗口
    pub sampling_window: Duration,
    /// 窗口内最小采样数，不足时不熔断
    pub minimum_samples: usize,
    /// Open状态的冷却时间，之后进入HalfOpen探测
    pub cooldown: Duration,
}

/// 行情接入配置
#[derive(Debug, Clone)]
pub struct MarketSettings {
    /// 连续失败N次后切换到轮询降级
    pub failure_threshold: u32,
    /// 流式provider单次读取超时
    pub stream_read_timeout: Duration,
    /// 轮询provider的间隔
    pub poll_interval: Duration,
    /// Degraded状态下的重试间隔
    pub degraded_retry_interval: Duration,
}

/// 纸面交易配置
#[derive(Debug, Clone)]
pub struct PaperSettings {
    /// 初始模拟余额
    pub initial_balance: f64,
    /// 市价单滑点（基点）
    pub slippage_bps: f64,
    /// 手续费（基点）
    pub fee_bps: f64,
}

/// 应用配置
#[derive(Debug, Clone)]
pub struct AppSettings {
    /// 跟踪的交易品种
    pub symbols: Vec<String>,
    /// 交易模式
    pub trading_mode: TradingMode,
    /// 事件总线模式
    pub bus_mode: BusMode,
    pub risk: RiskSettings,
    pub breaker: BreakerSettings,
    pub market: MarketSettings,
    pub paper: PaperSettings,
    /// 下单最大重试次数
    pub max_retries: usize,
    /// 重试间隔
    pub retry_delay: Duration,
    /// 下单请求超时
    pub order_timeout: Duration,
    /// 组合监控循环间隔
    pub monitor_interval: Duration,
    /// 快照重建循环间隔
    pub snapshot_interval: Duration,
    /// 挂单状态同步间隔
    pub order_sync_interval: Duration,
    /// 每分钟请求权重预算
    pub request_weight_per_minute: u32,
}

impl AppSettings {
    /// 从环境变量加载配置
    pub fn from_env() -> Self {
        Self {
            symbols: env_list("SYMBOLS", &["BTC-USDT", "ETH-USDT"]),
            trading_mode: TradingMode::from_str(&env_or_default("TRADING_MODE", "paper")),
            bus_mode: BusMode::from_str(&env_or_default("BUS_MODE", "in-process")),
            risk: RiskSettings {
                max_risk_percent: env_f64("MAX_RISK_PERCENT", 2.0),
                max_drawdown_percent: env_f64("MAX_DRAWDOWN_PERCENT", 20.0),
                min_risk_reward_ratio: env_f64("MIN_RISK_REWARD_RATIO", 1.5),
                max_open_positions: env_u64("MAX_OPEN_POSITIONS", 5) as usize,
                min_order_size: env_f64("MIN_ORDER_SIZE", 0.0001),
                max_order_size: env_f64("MAX_ORDER_SIZE", 100.0),
                quantity_precision: env_u64("QUANTITY_PRECISION", 4) as u32,
            },
            breaker: BreakerSettings {
                failure_ratio: env_f64("BREAKER_FAILURE_RATIO", 0.5),
                sampling_window: Duration::from_secs(env_u64("BREAKER_WINDOW_SECS", 60)),
                minimum_samples: env_u64("BREAKER_MIN_SAMPLES", 5) as usize,
                cooldown: Duration::from_secs(env_u64("BREAKER_COOLDOWN_SECS", 30)),
            },
            market: MarketSettings {
                failure_threshold: env_u64("MARKET_FAILURE_THRESHOLD", 3) as u32,
                stream_read_timeout: Duration::from_secs(env_u64("STREAM_READ_TIMEOUT_SECS", 30)),
                poll_interval: Duration::from_millis(env_u64("POLL_INTERVAL_MS", 2000)),
                degraded_retry_interval: Duration::from_millis(env_u64(
                    "DEGRADED_RETRY_INTERVAL_MS",
                    10000,
                )),
            },
            paper: PaperSettings {
                initial_balance: env_f64("PAPER_INITIAL_BALANCE", 10000.0),
                slippage_bps: env_f64("PAPER_SLIPPAGE_BPS", 2.0),
                fee_bps: env_f64("PAPER_FEE_BPS", 5.0),
            },
            max_retries: env_u64("ORDER_MAX_RETRIES", 3) as usize,
            retry_delay: Duration::from_millis(env_u64("ORDER_RETRY_DELAY_MS", 500)),
            order_timeout: Duration::from_secs(env_u64("ORDER_TIMEOUT_SECS", 10)),
            monitor_interval: Duration::from_millis(env_u64("MONITOR_INTERVAL_MS", 5000)),
            snapshot_interval: Duration::from_millis(env_u64("SNAPSHOT_INTERVAL_MS", 5000)),
            order_sync_interval: Duration::from_millis(env_u64("ORDER_SYNC_INTERVAL_MS", 3000)),
            request_weight_per_minute: env_u64("REQUEST_WEIGHT_PER_MINUTE", 1200) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let s = AppSettings::from_env();
        assert!(s.risk.max_risk_percent > 0.0);
        assert!(s.risk.max_drawdown_percent > s.risk.max_risk_percent);
        assert!(s.breaker.failure_ratio > 0.0 && s.breaker.failure_ratio <= 1.0);
        assert!(s.max_retries >= 1);
    }
}
