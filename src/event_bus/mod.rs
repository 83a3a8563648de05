//! 事件总线抽象
//!
//! 组件之间只通过总线和共享缓存通信，不做进程内直接调用。
//! 两个实现：进程内总线（单进程部署，至多一次投递），
//! Redis Streams总线（多进程部署，至少一次投递，处理函数需要幂等）。

pub mod in_process;
pub mod redis_stream;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::events::BusEvent;

pub use in_process::InProcessEventBus;
pub use redis_stream::RedisStreamEventBus;

/// 约定的topic
pub mod topics {
    pub const MARKET_TICKS: &str = "market-ticks";
    pub const TRADE_SIGNALS: &str = "trade-signals";
    pub const APPROVED_ORDERS: &str = "approved-orders";
    pub const EXECUTED_ORDERS: &str = "executed-orders";
    pub const RISK_ALERTS: &str = "risk-alerts";
    pub const KILL_SWITCH: &str = "kill-switch";
    pub const SYSTEM_HEALTH: &str = "system-health";
}

/// 事件处理函数。处理失败不会中断分发循环
pub type EventHandler =
    Arc<dyn Fn(BusEvent) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> + Send + Sync>;

/// 把异步闭包包装成EventHandler
pub fn handler<F, Fut>(f: F) -> EventHandler
where
    F: Fn(BusEvent) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(move |event| Box::pin(f(event)))
}

/// 事件总线契约
#[async_trait]
pub trait EventBus: Send + Sync {
    /// 发布事件到topic
    async fn publish(&self, topic: &str, event: &BusEvent) -> Result<()>;

    /// 订阅topic，handler在独立任务中被调用
    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<()>;
}
