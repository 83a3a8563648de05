use std::env;
use std::time::Duration;

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use tracing::{debug, error, info};

use crate::app_config::env::env_u64;

/// 缓存操作超时，卡死的缓存不能拖住控制循环
pub const CACHE_TIMEOUT: Duration = Duration::from_secs(2);

/// Redis连接池管理器
pub struct RedisConnectionPool {
    client: Client,
}

impl RedisConnectionPool {
    /// 创建新的连接池
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client =
            Client::open(redis_url).map_err(|e| anyhow!("Failed to create Redis client: {}", e))?;

        // 测试连接
        let _test_conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| {
                error!("Redis connection test failed: {}", redis_url);
                anyhow!("Failed to test Redis connection: {}", e)
            })?;

        debug!("Redis连接池初始化成功");

        Ok(Self { client })
    }

    /// 获取连接
    pub async fn get_connection(&self) -> Result<MultiplexedConnection> {
        let conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| anyhow!("Failed to get multiplexed connection: {}", e))?;
        Ok(conn)
    }
}

/// 全局Redis连接池实例
pub static REDIS_POOL: OnceCell<RedisConnectionPool> = OnceCell::new();

/// 初始化Redis连接池
pub async fn init_redis_pool() -> Result<()> {
    let redis_url =
        env::var("REDIS_HOST").unwrap_or_else(|_| "redis://127.0.0.1:6379/".to_string());

    let pool = RedisConnectionPool::new(&redis_url).await?;

    REDIS_POOL
        .set(pool)
        .map_err(|_| anyhow!("Failed to initialize Redis connection pool"))?;

    info!("Redis connection pool initialized successfully");
    Ok(())
}

/// 获取Redis连接池实例
pub fn get_redis_pool() -> Result<&'static RedisConnectionPool> {
    REDIS_POOL
        .get()
        .ok_or_else(|| anyhow!("Redis连接池未初始化，请先调用 init_redis_pool()"))
}

/// 获取Redis连接
pub async fn get_redis_connection() -> Result<MultiplexedConnection> {
    let pool = get_redis_pool()?;
    pool.get_connection().await
}

// ---------------------------------------------------------------
// 核心依赖的缓存key契约：下游通过key缺失判断数据过期
// ---------------------------------------------------------------

/// 最新价格key，值为十进制字符串
pub fn latest_price_key(symbol: &str) -> String {
    format!("price:latest:{}", symbol)
}

/// 最新tick key，值为JSON
pub fn latest_tick_key(symbol: &str) -> String {
    format!("tick:latest:{}", symbol)
}

/// 投资组合快照key
pub fn portfolio_snapshot_key() -> String {
    "portfolio:snapshot".to_string()
}

/// 开仓持仓key
pub fn open_position_key(symbol: &str) -> String {
    format!("position:open:{}", symbol)
}

/// 活跃订单key
pub fn active_order_key(order_id: &str) -> String {
    format!("order:active:{}", order_id)
}

/// tick类key的TTL（秒）
pub fn tick_ttl_secs() -> u64 {
    env_u64("TICK_TTL_SECS", 10)
}

/// 快照key的TTL（秒）
pub fn snapshot_ttl_secs() -> u64 {
    env_u64("SNAPSHOT_TTL_SECS", 60)
}

/// 订单key的TTL（秒）
pub fn order_ttl_secs() -> u64 {
    env_u64("ORDER_TTL_SECS", 3600)
}

/// 带超时写入一个字符串key
pub async fn set_with_ttl(key: &str, value: &str, ttl_secs: u64) -> Result<()> {
    let mut conn = get_redis_connection().await?;
    tokio::time::timeout(CACHE_TIMEOUT, conn.set_ex::<_, _, ()>(key, value, ttl_secs))
        .await
        .map_err(|_| anyhow!("缓存写入超时: {}", key))??;
    Ok(())
}

/// 带超时读取一个字符串key，key缺失返回None
pub async fn get_string(key: &str) -> Result<Option<String>> {
    let mut conn = get_redis_connection().await?;
    let value = tokio::time::timeout(CACHE_TIMEOUT, conn.get::<_, Option<String>>(key))
        .await
        .map_err(|_| anyhow!("缓存读取超时: {}", key))??;
    Ok(value)
}

/// 缩短key的TTL（订单进入终态时使用）
pub async fn shorten_ttl(key: &str, ttl_secs: i64) -> Result<()> {
    let mut conn = get_redis_connection().await?;
    tokio::time::timeout(CACHE_TIMEOUT, conn.expire::<_, ()>(key, ttl_secs))
        .await
        .map_err(|_| anyhow!("缓存expire超时: {}", key))??;
    Ok(())
}

/// 删除key
pub async fn delete_key(key: &str) -> Result<()> {
    let mut conn = get_redis_connection().await?;
    tokio::time::timeout(CACHE_TIMEOUT, conn.del::<_, ()>(key))
        .await
        .map_err(|_| anyhow!("缓存删除超时: {}", key))??;
    Ok(())
}

/// 读取最新缓存价格
pub async fn get_latest_price(symbol: &str) -> Result<Option<f64>> {
    let value = get_string(&latest_price_key(symbol)).await?;
    match value {
        Some(s) => Ok(s.parse::<f64>().ok()),
        None => Ok(None),
    }
}
