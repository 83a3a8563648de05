//! 交易所REST客户端
//!
//! 私有接口用HMAC-SHA256签名：timestamp + method + path + body，
//! 签名以base64放在请求头。所有请求经过限流器，请求超时10秒。

use std::env;
use std::sync::Arc;
use std::time::Duration;

use crate::error::app_error::{AppError, Result};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use sha2::Sha256;
use tracing::{debug, warn};

use crate::exchange::dto::{
    AccountBalanceDto, ApiResponse, CancelAckDto, CandleDto, OrderAckDto, OrderDetailDto,
    PlaceOrderReqDto, TickerDto,
};
use crate::exchange::rate_limiter::SlidingWindowRateLimiter;

/// 下单等请求的超时
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct ExchangeClient {
    client: Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    passphrase: String,
    rate_limiter: Arc<SlidingWindowRateLimiter>,
    /// 模拟盘请求需要额外的header
    simulated_trading: bool,
}

impl ExchangeClient {
    pub fn new(
        base_url: String,
        api_key: String,
        api_secret: String,
        passphrase: String,
        rate_limiter: Arc<SlidingWindowRateLimiter>,
        simulated_trading: bool,
    ) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url,
            api_key,
            api_secret,
            passphrase,
            rate_limiter,
            simulated_trading,
        })
    }

    /// 无凭证构造，只能访问公共接口。Paper模式下行情轮询用
    pub fn public_from_env(rate_limiter: Arc<SlidingWindowRateLimiter>) -> Result<Self> {
        let base_url = env::var("EXCHANGE_BASE_URL")
            .unwrap_or_else(|_| "https://www.okx.com".to_string());
        Self::new(
            base_url,
            String::new(),
            String::new(),
            String::new(),
            rate_limiter,
            false,
        )
    }

    /// 从环境变量构造
    pub fn from_env(rate_limiter: Arc<SlidingWindowRateLimiter>) -> Result<Self> {
        let base_url = env::var("EXCHANGE_BASE_URL")
            .unwrap_or_else(|_| "https://www.okx.com".to_string());
        let api_key = env::var("EXCHANGE_API_KEY").map_err(|_| AppError::Config("未配置EXCHANGE_API_KEY".to_string()))?;
        let api_secret =
            env::var("EXCHANGE_API_SECRET").map_err(|_| AppError::Config("未配置EXCHANGE_API_SECRET".to_string()))?;
        let passphrase =
            env::var("EXCHANGE_PASSPHRASE").map_err(|_| AppError::Config("未配置EXCHANGE_PASSPHRASE".to_string()))?;
        let simulated = env::var("EXCHANGE_SIMULATED_TRADING").unwrap_or_default() == "1";
        Self::new(base_url, api_key, api_secret, passphrase, rate_limiter, simulated)
    }

    fn generate_signature(&self, timestamp: &str, method: &Method, path: &str, body: &str) -> String {
        let sign_payload = format!("{}{}{}{}", timestamp, method.as_str(), path, body);
        let mut hmac = Hmac::<Sha256>::new_from_slice(self.api_secret.as_bytes())
            .expect("hmac accepts any key length");
        hmac.update(sign_payload.as_bytes());
        base64::encode(hmac.finalize().into_bytes())
    }

    /// 发送请求并解析信封。signed为true时附加签名头
    async fn send_request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &str,
        signed: bool,
        weight: u32,
    ) -> Result<Vec<T>> {
        self.rate_limiter.acquire(weight).await;

        let url = format!("{}{}", self.base_url, path);
        let mut request_builder = self
            .client
            .request(method.clone(), &url)
            .header("Content-Type", "application/json");

        if signed {
            let timestamp = chrono::Utc::now()
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string();
            let signature = self.generate_signature(&timestamp, &method, path, body);
            request_builder = request_builder
                .header("OK-ACCESS-KEY", &self.api_key)
                .header("OK-ACCESS-SIGN", signature)
                .header("OK-ACCESS-TIMESTAMP", timestamp)
                .header("OK-ACCESS-PASSPHRASE", &self.passphrase);
        }

        if self.simulated_trading {
            request_builder = request_builder.header("x-simulated-trading", "1");
        }

        if !body.is_empty() {
            request_builder = request_builder.body(body.to_string());
        }

        let response = request_builder.send().await?;
        let status_code = response.status();
        let response_body = response.text().await?;
        debug!("path: {}, exchange_response: {}", path, response_body);

        if status_code != StatusCode::OK {
            return Err(AppError::Network(format!(
                "请求失败: status={}, body={}",
                status_code, response_body
            )));
        }

        let envelope: ApiResponse<T> = serde_json::from_str(&response_body)?;
        if envelope.code != "0" {
            return Err(AppError::ExchangeApiError(format!(
                "code={}, msg={}",
                envelope.code, envelope.msg
            )));
        }
        Ok(envelope.data)
    }

    /// 获取交易所系统时间（毫秒时间戳）
    pub async fn get_server_time(&self) -> Result<i64> {
        #[derive(serde::Deserialize)]
        struct TimeDto {
            ts: String,
        }
        let data: Vec<TimeDto> = self
            .send_request(Method::GET, "/api/v5/public/time", "", false, 1)
            .await?;
        data.first()
            .and_then(|t| t.ts.parse::<i64>().ok())
            .ok_or_else(|| AppError::Parse("系统时间响应为空".to_string()))
    }

    /// 获取最新ticker
    pub async fn get_ticker(&self, symbol: &str) -> Result<TickerDto> {
        let path = format!("/api/v5/market/ticker?instId={}", symbol);
        let data: Vec<TickerDto> = self.send_request(Method::GET, &path, "", false, 1).await?;
        data.into_iter()
            .next()
            .ok_or_else(|| AppError::ExchangeApiError(format!("ticker响应为空: {}", symbol)))
    }

    /// 获取K线
    pub async fn get_candles(&self, symbol: &str, bar: &str, limit: u32) -> Result<Vec<CandleDto>> {
        let path = format!(
            "/api/v5/market/candles?instId={}&bar={}&limit={}",
            symbol, bar, limit
        );
        let data: Vec<Vec<String>> = self.send_request(Method::GET, &path, "", false, 1).await?;
        Ok(data.into_iter().filter_map(CandleDto::from_vec).collect())
    }

    /// 获取账户余额（签名接口）
    pub async fn get_account_balance(&self) -> Result<AccountBalanceDto> {
        let data: Vec<AccountBalanceDto> = self
            .send_request(Method::GET, "/api/v5/account/balance", "", true, 5)
            .await?;
        data.into_iter()
            .next()
            .ok_or_else(|| AppError::ExchangeApiError("账户余额响应为空".to_string()))
    }

    /// 下单（签名接口）
    pub async fn place_order(&self, req: &PlaceOrderReqDto) -> Result<OrderAckDto> {
        let body = serde_json::to_string(req)?;
        let data: Vec<OrderAckDto> = self
            .send_request(Method::POST, "/api/v5/trade/order", &body, true, 1)
            .await?;
        let ack = data
            .into_iter()
            .next()
            .ok_or_else(|| AppError::ExchangeApiError("下单响应为空".to_string()))?;
        if ack.s_code != "0" {
            return Err(AppError::ExchangeApiError(format!(
                "下单被拒绝: code={}, msg={}",
                ack.s_code, ack.s_msg
            )));
        }
        Ok(ack)
    }

    /// 撤单（签名接口）
    pub async fn cancel_order(&self, symbol: &str, exchange_order_id: &str) -> Result<CancelAckDto> {
        let body = serde_json::json!({
            "instId": symbol,
            "ordId": exchange_order_id,
        })
        .to_string();
        let data: Vec<CancelAckDto> = self
            .send_request(Method::POST, "/api/v5/trade/cancel-order", &body, true, 1)
            .await?;
        data.into_iter()
            .next()
            .ok_or_else(|| AppError::ExchangeApiError("撤单响应为空".to_string()))
    }

    /// 查询订单详情（签名接口）
    pub async fn get_order_detail(
        &self,
        symbol: &str,
        exchange_order_id: &str,
    ) -> Result<OrderDetailDto> {
        let path = format!(
            "/api/v5/trade/order?instId={}&ordId={}",
            symbol, exchange_order_id
        );
        let data: Vec<OrderDetailDto> = self.send_request(Method::GET, &path, "", true, 1).await?;
        data.into_iter().next().ok_or_else(|| {
            warn!("订单查询无结果: {}", exchange_order_id);
            AppError::ExchangeApiError(format!("订单不存在: {}", exchange_order_id))
        })
    }
}
