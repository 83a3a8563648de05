//! 统一错误类型定义

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AppError>;

/// 应用错误
#[derive(Error, Debug)]
pub enum AppError {
    /// 业务错误
    #[error("业务错误: {0}")]
    BizError(String),

    /// 数据库错误
    #[error("数据库错误: {0}")]
    DbError(String),

    /// 缓存错误
    #[error("缓存错误: {0}")]
    CacheError(String),

    /// 交易所API错误
    #[error("交易所API错误: {0}")]
    ExchangeApiError(String),

    /// 网络错误
    #[error("网络错误: {0}")]
    Network(String),

    /// 解析错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),

    /// 未知错误
    #[error("未知错误: {0}")]
    Unknown(String),
}

// 通用错误转换
impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError::Unknown(e.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Unknown(e.to_string())
    }
}

impl From<redis::RedisError> for AppError {
    fn from(e: redis::RedisError) -> Self {
        AppError::CacheError(e.to_string())
    }
}

impl From<reqwest::Error> for AppError {
    fn from(e: reqwest::Error) -> Self {
        AppError::Network(e.to_string())
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::Parse(e.to_string())
    }
}
