use std::env;

use anyhow::{anyhow, Result};
use once_cell::sync::OnceCell;
use rbatis::RBatis;
use rbdc_mysql::MysqlDriver;
use tracing::{info, warn};

/// 全局数据库客户端
static DB_CLIENT: OnceCell<RBatis> = OnceCell::new();

/// 初始化数据库连接。未配置 DB_HOST 时跳过，订单流水只保留在内存与缓存中
pub async fn init_db() -> Result<()> {
    let db_url = match env::var("DB_HOST") {
        Ok(v) if !v.trim().is_empty() => v,
        _ => {
            warn!("未配置DB_HOST，交易流水持久化已禁用");
            return Ok(());
        }
    };

    let rb = RBatis::new();
    rb.link(MysqlDriver {}, &db_url)
        .await
        .map_err(|e| anyhow!("数据库连接失败: {}", e))?;

    DB_CLIENT
        .set(rb)
        .map_err(|_| anyhow!("数据库客户端重复初始化"))?;

    info!("数据库连接初始化成功");
    Ok(())
}

/// 获取全局数据库客户端，未初始化时返回None
pub fn try_get_db_client() -> Option<&'static RBatis> {
    DB_CLIENT.get()
}

/// 获取全局数据库客户端
pub fn get_db_client() -> Result<&'static RBatis> {
    DB_CLIENT
        .get()
        .ok_or_else(|| anyhow!("数据库未初始化，请先调用 init_db()"))
}
