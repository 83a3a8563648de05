//! Redis Streams事件总线
//!
//! XADD发布 / XREADGROUP消费者组消费：至少一次投递、持久化（断开期间
//! 发布的消息重连后仍会收到）、同一topic内竞争消费。处理失败的消息
//! 不做XACK，留在pending列表等待重投；处理函数必须幂等。

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use redis::streams::{
    StreamClaimReply, StreamId, StreamPendingCountReply, StreamReadOptions, StreamReadReply,
};
use redis::AsyncCommands;
use tracing::{debug, error, info, warn};

use crate::app_config::redis as app_redis;
use crate::domain::events::BusEvent;
use crate::event_bus::{EventBus, EventHandler};

/// 消费者组名
const CONSUMER_GROUP: &str = "rust_trader";

/// 单次读取的最大消息数
const READ_COUNT: usize = 10;

/// 读取阻塞时间（毫秒）
const BLOCK_MILLIS: usize = 2000;

/// pending消息空闲超过该毫秒数后被重新认领
const RECLAIM_IDLE_MILLIS: usize = 30_000;

pub struct RedisStreamEventBus {
    /// 本进程的消费者名
    consumer_name: String,
}

impl RedisStreamEventBus {
    pub fn new() -> Self {
        Self {
            consumer_name: format!("consumer-{}", uuid::Uuid::new_v4()),
        }
    }

    /// 确保消费者组存在，BUSYGROUP视为已存在
    async fn ensure_group(topic: &str) -> Result<()> {
        let mut conn = app_redis::get_redis_connection().await?;
        let res: redis::RedisResult<String> = conn
            .xgroup_create_mkstream(topic, CONSUMER_GROUP, "$")
            .await;
        match res {
            Ok(_) => {
                info!("消费者组创建成功: topic={}, group={}", topic, CONSUMER_GROUP);
                Ok(())
            }
            Err(e) if e.to_string().contains("BUSYGROUP") => Ok(()),
            Err(e) => Err(anyhow!("创建消费者组失败: topic={}, error={}", topic, e)),
        }
    }

    fn payload_of(entry: &StreamId) -> Option<String> {
        match entry.map.get("payload") {
            Some(redis::Value::Data(bytes)) => String::from_utf8(bytes.clone()).ok(),
            _ => None,
        }
    }

    /// 处理一条消息：反序列化、执行handler、成功则ACK
    async fn process_entry(topic: &str, entry: &StreamId, handler: &EventHandler) {
        let payload = match Self::payload_of(entry) {
            Some(p) => p,
            None => {
                warn!("消息缺少payload字段，直接ACK丢弃: topic={}, id={}", topic, entry.id);
                Self::ack(topic, &entry.id).await;
                return;
            }
        };

        let event: BusEvent = match serde_json::from_str(&payload) {
            Ok(e) => e,
            Err(e) => {
                // 无法解析的消息重投也不会成功，ACK后丢弃
                warn!("消息解析失败，ACK丢弃: topic={}, id={}, error={}", topic, entry.id, e);
                Self::ack(topic, &entry.id).await;
                return;
            }
        };

        match handler(event).await {
            Ok(()) => Self::ack(topic, &entry.id).await,
            Err(e) => {
                // 不ACK，留在pending等待重投
                error!("事件处理失败，等待重投: topic={}, id={}, error={:?}", topic, entry.id, e);
            }
        }
    }

    async fn ack(topic: &str, id: &str) {
        match app_redis::get_redis_connection().await {
            Ok(mut conn) => {
                let res: redis::RedisResult<i64> = conn.xack(topic, CONSUMER_GROUP, &[id]).await;
                if let Err(e) = res {
                    warn!("XACK失败: topic={}, id={}, error={}", topic, id, e);
                }
            }
            Err(e) => warn!("XACK获取连接失败: {:?}", e),
        }
    }

    /// 认领空闲过久的pending消息（其他消费者崩溃遗留的）
    async fn reclaim_pending(topic: &str, consumer: &str, handler: &EventHandler) -> Result<()> {
        let mut conn = app_redis::get_redis_connection().await?;

        let pending: StreamPendingCountReply = conn
            .xpending_count(topic, CONSUMER_GROUP, "-", "+", READ_COUNT)
            .await?;
        if pending.ids.is_empty() {
            return Ok(());
        }

        let ids: Vec<String> = pending.ids.iter().map(|p| p.id.clone()).collect();
        let claimed: StreamClaimReply = conn
            .xclaim(topic, CONSUMER_GROUP, consumer, RECLAIM_IDLE_MILLIS, &ids)
            .await?;

        for entry in &claimed.ids {
            debug!("重新认领pending消息: topic={}, id={}", topic, entry.id);
            Self::process_entry(topic, entry, handler).await;
        }
        Ok(())
    }
}

impl Default for RedisStreamEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventBus for RedisStreamEventBus {
    async fn publish(&self, topic: &str, event: &BusEvent) -> Result<()> {
        let payload = serde_json::to_string(event)?;
        let mut conn = app_redis::get_redis_connection().await?;
        let _id: String = conn.xadd(topic, "*", &[("payload", payload.as_str())]).await?;
        Ok(())
    }

    async fn subscribe(&self, topic: &str, handler: EventHandler) -> Result<()> {
        Self::ensure_group(topic).await?;

        let topic = topic.to_string();
        let consumer = self.consumer_name.clone();

        tokio::spawn(async move {
            loop {
                // 先认领崩溃消费者遗留的pending消息
                if let Err(e) = Self::reclaim_pending(&topic, &consumer, &handler).await {
                    debug!("pending认领失败: topic={}, error={:?}", topic, e);
                }

                let mut conn = match app_redis::get_redis_connection().await {
                    Ok(c) => c,
                    Err(e) => {
                        error!("总线消费获取连接失败: topic={}, error={:?}", topic, e);
                        tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                        continue;
                    }
                };

                let opts = StreamReadOptions::default()
                    .group(CONSUMER_GROUP, &consumer)
                    .count(READ_COUNT)
                    .block(BLOCK_MILLIS);

                let reply: StreamReadReply =
                    match conn.xread_options(&[&topic], &[">"], &opts).await {
                        Ok(r) => r,
                        Err(e) => {
                            error!("XREADGROUP失败: topic={}, error={}", topic, e);
                            tokio::time::sleep(std::time::Duration::from_secs(1)).await;
                            continue;
                        }
                    };

                for key in &reply.keys {
                    for entry in &key.ids {
                        Self::process_entry(&topic, entry, &handler).await;
                    }
                }
            }
        });

        Ok(())
    }
}
