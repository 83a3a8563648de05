use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use dotenv::dotenv;
use tracing::{error, info, warn};

use rust_trader::app_config;
use rust_trader::app_config::settings::AppSettings;
use rust_trader::domain::enums::{BusMode, TradingMode};
use rust_trader::domain::events::BusEvent;
use rust_trader::event_bus::{
    handler, topics, EventBus, InProcessEventBus, RedisStreamEventBus,
};
use rust_trader::exchange::{ExchangeClient, SlidingWindowRateLimiter};
use rust_trader::execution::{
    CircuitBreaker, ExecutionEngine, LiveAdapter, OrderTracker, PaperAdapter, PositionTracker,
    TradingModeManager,
};
use rust_trader::job::{PortfolioJob, ShutdownManager, TaskScheduler};
use rust_trader::market::{MarketDataService, RestPoller, StreamClient};
use rust_trader::risk::{DrawdownMonitor, KillSwitchManager, RiskEngine};

#[derive(Parser, Debug)]
#[command(name = "rust_trader", about = "自动化加密资产交易控制循环")]
struct Cli {
    /// 交易模式覆盖: live / paper / backtest / simulation
    #[arg(long)]
    mode: Option<String>,

    /// 品种列表覆盖，逗号分隔
    #[arg(long)]
    symbols: Option<String>,
}

// 验证系统时间与交易所时间的偏差
async fn validate_system_time(client: &ExchangeClient) {
    match client.get_server_time().await {
        Ok(server_ms) => {
            let now = chrono::Utc::now().timestamp_millis();
            let time_diff = (now - server_ms).abs();
            if time_diff < 20000 {
                info!("时间间隔相差值: {} 毫秒", time_diff);
            } else {
                warn!("时间未同步，时间间隔相差值: {} 毫秒", time_diff);
            }
        }
        Err(e) => warn!("获取交易所系统时间失败: {:?}", e),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // 设置日志
    app_config::log::setup_logging().await?;

    let cli = Cli::parse();
    let mut settings = AppSettings::from_env();
    if let Some(mode) = &cli.mode {
        settings.trading_mode = TradingMode::from_str(mode);
    }
    if let Some(symbols) = &cli.symbols {
        settings.symbols = symbols
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
    }
    info!(
        "🚀 rust_trader启动: mode={}, symbols={:?}",
        settings.trading_mode, settings.symbols
    );

    // 基础设施
    app_config::redis::init_redis_pool().await?;
    app_config::db::init_db().await?;

    // 事件总线
    let bus: Arc<dyn EventBus> = match settings.bus_mode {
        BusMode::InProcess => {
            info!("✅ 使用进程内事件总线");
            Arc::new(InProcessEventBus::new())
        }
        BusMode::RedisStream => {
            info!("✅ 使用Redis Streams事件总线");
            Arc::new(RedisStreamEventBus::new())
        }
    };

    // 交易所客户端。非Live模式允许无凭证运行（只用公共行情接口）
    let rate_limiter = Arc::new(SlidingWindowRateLimiter::per_minute(
        settings.request_weight_per_minute,
    ));
    let exchange_client = match ExchangeClient::from_env(Arc::clone(&rate_limiter)) {
        Ok(client) => Arc::new(client),
        Err(e) if !settings.trading_mode.is_live() => {
            warn!("交易所凭证未配置（{}），以公共接口模式运行", e);
            Arc::new(ExchangeClient::public_from_env(Arc::clone(&rate_limiter))?)
        }
        Err(e) => return Err(e.into()),
    };

    if settings.trading_mode.is_live() {
        validate_system_time(&exchange_client).await;
    }

    // 风控组件
    let kill_switch = Arc::new(KillSwitchManager::new(settings.risk.max_drawdown_percent));
    let drawdown = Arc::new(DrawdownMonitor::new(0.0));
    let risk_engine = Arc::new(RiskEngine::new(
        settings.risk.clone(),
        Arc::clone(&kill_switch),
        Arc::clone(&drawdown),
        Arc::clone(&bus),
    ));

    // 执行组件
    let mode_manager = Arc::new(TradingModeManager::new(settings.trading_mode));
    let breaker = Arc::new(CircuitBreaker::new(settings.breaker.clone()));
    let order_tracker = Arc::new(OrderTracker::new());
    let position_tracker = Arc::new(PositionTracker::new());
    let live_adapter = Arc::new(LiveAdapter::new(Arc::clone(&exchange_client)));
    let paper_adapter = Arc::new(PaperAdapter::new(settings.paper.clone()));
    let execution_engine = Arc::new(ExecutionEngine::new(
        Arc::clone(&mode_manager),
        live_adapter,
        paper_adapter,
        Arc::clone(&breaker),
        Arc::clone(&order_tracker),
        Arc::clone(&position_tracker),
        Arc::clone(&bus),
        settings.max_retries,
        settings.retry_delay,
    ));

    // 订阅: trade-signals → 风控评估
    {
        let risk_engine = Arc::clone(&risk_engine);
        bus.subscribe(
            topics::TRADE_SIGNALS,
            handler(move |event| {
                let risk_engine = Arc::clone(&risk_engine);
                async move {
                    if let BusEvent::Signal(signal) = event {
                        risk_engine.handle_signal(signal).await;
                    }
                    Ok(())
                }
            }),
        )
        .await?;
    }

    // 订阅: approved-orders → 执行引擎
    {
        let execution_engine = Arc::clone(&execution_engine);
        bus.subscribe(
            topics::APPROVED_ORDERS,
            handler(move |event| {
                let execution_engine = Arc::clone(&execution_engine);
                async move {
                    if let BusEvent::ApprovedOrder(order) = event {
                        execution_engine.handle_approved_order(order).await;
                    }
                    Ok(())
                }
            }),
        )
        .await?;
    }

    // 关闭管理
    let shutdown_manager = Arc::new(ShutdownManager::new_default());
    let shutdown_flag = shutdown_manager.shutdown_signal();

    // 行情接入
    let stream_client = StreamClient::new(settings.symbols.clone());
    let stream_rx = stream_client.start(Arc::clone(&shutdown_flag));
    let poller = RestPoller::new(Arc::clone(&exchange_client));
    let market_service = Arc::new(MarketDataService::new(
        Arc::clone(&bus),
        poller,
        settings.market.clone(),
        settings.symbols.clone(),
    ));
    let ingestion_handle = {
        let market_service = Arc::clone(&market_service);
        let flag = Arc::clone(&shutdown_flag);
        tokio::spawn(async move {
            market_service.run(stream_rx, flag).await;
        })
    };

    // 定时任务
    let mut scheduler = TaskScheduler::new();
    {
        let portfolio_job = Arc::new(PortfolioJob::new(
            Arc::clone(&execution_engine),
            Arc::clone(&position_tracker),
            Arc::clone(&drawdown),
        ));
        scheduler.add_periodic_task(
            "portfolio_snapshot_job".to_string(),
            settings.snapshot_interval,
            move || {
                let job = Arc::clone(&portfolio_job);
                async move {
                    job.run_once().await;
                }
            },
        );
    }
    {
        let risk_engine = Arc::clone(&risk_engine);
        scheduler.add_periodic_task(
            "risk_monitor_job".to_string(),
            settings.monitor_interval,
            move || {
                let risk_engine = Arc::clone(&risk_engine);
                async move {
                    risk_engine.monitor_once().await;
                }
            },
        );
    }
    {
        let execution_engine = Arc::clone(&execution_engine);
        scheduler.add_periodic_task(
            "order_sync_job".to_string(),
            settings.order_sync_interval,
            move || {
                let execution_engine = Arc::clone(&execution_engine);
                async move {
                    execution_engine.sync_pending_orders().await;
                }
            },
        );
    }

    // 关闭回调：落最后一份快照
    {
        let position_tracker = Arc::clone(&position_tracker);
        let execution_engine = Arc::clone(&execution_engine);
        let drawdown = Arc::clone(&drawdown);
        shutdown_manager
            .register_shutdown_hook("final_snapshot".to_string(), move || {
                let position_tracker = Arc::clone(&position_tracker);
                let execution_engine = Arc::clone(&execution_engine);
                let drawdown = Arc::clone(&drawdown);
                async move {
                    if let Ok(balance) = execution_engine.get_balance().await {
                        let snapshot = position_tracker
                            .build_snapshot(balance, drawdown.current_drawdown());
                        rust_trader::model::portfolio_snapshot::record(&snapshot).await;
                    }
                    Ok(())
                }
            })
            .await;
    }

    info!("✅ 所有组件启动完成");

    // 等待关闭信号
    let signal = ShutdownManager::wait_for_shutdown_signal().await;
    info!("收到{}信号，开始优雅关闭", signal);

    if let Err(e) = shutdown_manager.shutdown().await {
        error!("优雅关闭失败: {:?}", e);
    }
    scheduler.shutdown().await;
    let _ = ingestion_handle.await;

    info!("rust_trader已退出");
    Ok(())
}
