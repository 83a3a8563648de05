//! 流式行情客户端
//!
//! 订阅交易所WebSocket的tickers频道，解析成内部Tick推到channel。
//! 断线用指数退避重连：1秒起步，每次翻倍，封顶120秒，连接成功后归位。

use std::env;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};

use crate::domain::tick::Tick;
use crate::exchange::dto::TickerDto;

/// 重连退避的起点与上限
const BACKOFF_INITIAL: Duration = Duration::from_secs(1);
const BACKOFF_MAX: Duration = Duration::from_secs(120);

/// 心跳间隔与读取超时
const PING_INTERVAL: Duration = Duration::from_secs(15);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
struct WsArg {
    channel: String,
    #[serde(rename = "instId")]
    inst_id: String,
}

#[derive(Debug, Deserialize)]
struct WsTickerMsg {
    arg: WsArg,
    data: Vec<TickerDto>,
}

#[derive(Debug, Deserialize)]
struct WsEventMsg {
    event: String,
    #[serde(default)]
    msg: String,
}

pub struct StreamClient {
    url: String,
    symbols: Vec<String>,
}

impl StreamClient {
    pub fn new(symbols: Vec<String>) -> Self {
        let url = env::var("EXCHANGE_WS_URL")
            .unwrap_or_else(|_| "wss://ws.okx.com:8443/ws/v5/public".to_string());
        Self { url, symbols }
    }

    /// 启动连接任务，返回tick接收端
    pub fn start(&self, shutdown: Arc<AtomicBool>) -> mpsc::Receiver<Tick> {
        let (tx, rx) = mpsc::channel::<Tick>(1024);
        let url = self.url.clone();
        let symbols = self.symbols.clone();

        tokio::spawn(async move {
            run_connection_loop(url, symbols, tx, shutdown).await;
        });

        rx
    }
}

async fn run_connection_loop(
    url: String,
    symbols: Vec<String>,
    tx: mpsc::Sender<Tick>,
    shutdown: Arc<AtomicBool>,
) {
    let mut backoff = BACKOFF_INITIAL;

    loop {
        if shutdown.load(Ordering::Acquire) {
            break;
        }

        match connect_async(url.as_str()).await {
            Ok((ws_stream, _)) => {
                info!("行情WebSocket连接成功: {}", url);
                // 连接成功，退避归位
                backoff = BACKOFF_INITIAL;
                if let Err(e) = run_session(ws_stream, &symbols, &tx, &shutdown).await {
                    warn!("行情WebSocket会话中断: {:?}", e);
                }
            }
            Err(e) => {
                error!("行情WebSocket连接失败: {:?}", e);
            }
        }

        if shutdown.load(Ordering::Acquire) {
            break;
        }

        warn!("{:?} 后重连行情WebSocket", backoff);
        tokio::time::sleep(backoff).await;
        backoff = (backoff * 2).min(BACKOFF_MAX);
    }

    info!("行情WebSocket连接任务退出");
}

async fn run_session(
    ws_stream: tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >,
    symbols: &[String],
    tx: &mpsc::Sender<Tick>,
    shutdown: &Arc<AtomicBool>,
) -> Result<()> {
    let (mut write, mut read) = ws_stream.split();

    // 订阅tickers频道
    let args: Vec<serde_json::Value> = symbols
        .iter()
        .map(|s| json!({"channel": "tickers", "instId": s}))
        .collect();
    let sub_msg = json!({"op": "subscribe", "args": args}).to_string();
    write.send(Message::Text(sub_msg)).await?;

    let mut ping_timer = tokio::time::interval(PING_INTERVAL);
    ping_timer.tick().await; // 第一次tick立即返回，跳过

    loop {
        if shutdown.load(Ordering::Acquire) {
            return Ok(());
        }

        tokio::select! {
            _ = ping_timer.tick() => {
                write.send(Message::Text("ping".to_string())).await?;
            }
            msg = tokio::time::timeout(READ_TIMEOUT, read.next()) => {
                match msg {
                    Err(_) => return Err(anyhow!("读取超时，视为连接失效")),
                    Ok(None) => return Err(anyhow!("连接被对端关闭")),
                    Ok(Some(Err(e))) => return Err(anyhow!("读取错误: {}", e)),
                    Ok(Some(Ok(Message::Text(text)))) => {
                        handle_text_message(&text, tx).await;
                    }
                    Ok(Some(Ok(Message::Ping(data)))) => {
                        write.send(Message::Pong(data)).await?;
                    }
                    Ok(Some(Ok(Message::Close(_)))) => {
                        return Err(anyhow!("收到关闭帧"));
                    }
                    Ok(Some(Ok(_))) => {}
                }
            }
        }
    }
}

async fn handle_text_message(text: &str, tx: &mpsc::Sender<Tick>) {
    if text == "pong" {
        return;
    }

    if let Ok(msg) = serde_json::from_str::<WsTickerMsg>(text) {
        if msg.arg.channel != "tickers" {
            return;
        }
        for dto in &msg.data {
            match dto.to_tick() {
                Some(tick) => {
                    if tx.send(tick).await.is_err() {
                        // 接收端已关闭，会话随后退出
                        return;
                    }
                }
                None => warn!("ticker数据解析失败: inst_id={}", msg.arg.inst_id),
            }
        }
    } else if let Ok(event) = serde_json::from_str::<WsEventMsg>(text) {
        if event.event == "error" {
            error!("WebSocket错误消息: {}", event.msg);
        } else {
            debug!("WebSocket确认消息: event={}", event.event);
        }
    }
}
