//! 进程内事件总线
//!
//! 基于 tokio broadcast channel：至多一次投递，同一发布方内按发布顺序投递，
//! 不持久化（只有发布时刻在线的订阅者能收到）。

use anyhow::Result;
use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::broadcast;
use tracing::{debug, error, warn};

use crate::domain::events::BusEvent;
use crate::event_bus::{EventBus, EventHandler};

/// 每个topic的channel容量，慢订阅者超过容量会丢最旧的事件
const TOPIC_CAPACITY: usize = 1024;

pub struct InProcessEventBus {
    topics: DashMap<String, broadcast::Sender<BusEvent>>,
}

impl InProcessEventBus {
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<BusEvent> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }
}

impl Default for InProcessEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for InProcessEventBus {
    async fn publish(&self, topic: &str, event: &BusEvent) -> Result<()> {
        let sender = self.sender_for(topic);
        // 没有订阅者时send返回Err，事件直接丢弃，属于正常情况
        if sender.send(event.clone()).is_err() {
            debug!("topic无订阅者，事件丢弃: {}", topic);
        }
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<()> {
        let mut receiver = self.sender_for(topic).subscribe();
        let topic = topic.to_string();

        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => {
                        // 处理函数出错只记录日志，分发循环继续
                        if let Err(e) = handler(event).await {
                            error!("事件处理失败: topic={}, error={:?}", topic, e);
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("订阅者处理过慢，丢弃{}条事件: topic={}", n, topic);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("topic已关闭，分发循环退出: {}", topic);
                        break;
                    }
                }
            }
        });

        Ok(())
    }
}
