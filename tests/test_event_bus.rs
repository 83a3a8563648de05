//! 进程内事件总线集成测试：顺序、topic隔离、信号去重

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rust_trader::app_config::settings::RiskSettings;
use rust_trader::domain::events::BusEvent;
use rust_trader::domain::signal::{SignalAction, TradeSignal};
use rust_trader::domain::Tick;
use rust_trader::event_bus::{handler, topics, EventBus, InProcessEventBus};
use rust_trader::risk::{DrawdownMonitor, KillSwitchManager, RiskEngine};

#[tokio::test]
async fn test_per_publisher_ordering() {
    let bus = InProcessEventBus::new();
    let received = Arc::new(Mutex::new(Vec::new()));
    let received_clone = Arc::clone(&received);

    bus.subscribe(
        topics::MARKET_TICKS,
        handler(move |event| {
            let received = Arc::clone(&received_clone);
            async move {
                if let BusEvent::Tick(tick) = event {
                    received.lock().unwrap().push(tick.price);
                }
                Ok(())
            }
        }),
    )
    .await
    .unwrap();

    // 同一发布方按顺序发布100条tick
    for i in 0..100 {
        let tick = Tick::new("BTC-USDT", 50000.0 + i as f64, 1.0, 0.0, 0.0);
        bus.publish(topics::MARKET_TICKS, &BusEvent::Tick(tick))
            .await
            .unwrap();
    }

    tokio::time::sleep(Duration::from_millis(200)).await;
    let prices = received.lock().unwrap().clone();
    assert_eq!(prices.len(), 100);
    // 同一订阅者收到的顺序与发布顺序一致
    for (i, price) in prices.iter().enumerate() {
        assert_eq!(*price, 50000.0 + i as f64);
    }
}

#[tokio::test]
async fn test_topics_are_isolated() {
    let bus = InProcessEventBus::new();
    let tick_count = Arc::new(AtomicUsize::new(0));
    let signal_count = Arc::new(AtomicUsize::new(0));

    {
        let tick_count = Arc::clone(&tick_count);
        bus.subscribe(
            topics::MARKET_TICKS,
            handler(move |_| {
                let tick_count = Arc::clone(&tick_count);
                async move {
                    tick_count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();
    }
    {
        let signal_count = Arc::clone(&signal_count);
        bus.subscribe(
            topics::TRADE_SIGNALS,
            handler(move |_| {
                let signal_count = Arc::clone(&signal_count);
                async move {
                    signal_count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();
    }

    let tick = Tick::new("BTC-USDT", 50000.0, 1.0, 0.0, 0.0);
    bus.publish(topics::MARKET_TICKS, &BusEvent::Tick(tick))
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(tick_count.load(Ordering::SeqCst), 1);
    assert_eq!(signal_count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_duplicate_signal_processed_once() {
    // 持久化总线是至少一次投递，风控引擎必须对重复信号幂等。
    // 这里快照不可用，每次评估都会产生一条risk-alert，
    // 重复信号不应产生第二条。
    let bus: Arc<InProcessEventBus> = Arc::new(InProcessEventBus::new());
    let alert_count = Arc::new(AtomicUsize::new(0));

    {
        let alert_count = Arc::clone(&alert_count);
        bus.subscribe(
            topics::RISK_ALERTS,
            handler(move |_| {
                let alert_count = Arc::clone(&alert_count);
                async move {
                    alert_count.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                }
            }),
        )
        .await
        .unwrap();
    }

    let settings = RiskSettings {
        max_risk_percent: 2.0,
        max_drawdown_percent: 20.0,
        min_risk_reward_ratio: 1.5,
        max_open_positions: 5,
        min_order_size: 0.0001,
        max_order_size: 100.0,
        quantity_precision: 4,
    };
    let engine = RiskEngine::new(
        settings,
        Arc::new(KillSwitchManager::new(20.0)),
        Arc::new(DrawdownMonitor::new(10000.0)),
        Arc::clone(&bus) as Arc<dyn EventBus>,
    );

    let signal = TradeSignal::new("BTC-USDT", SignalAction::Buy, "t")
        .with_price(50000.0)
        .with_stop_loss(49000.0);

    engine.handle_signal(signal.clone()).await;
    engine.handle_signal(signal).await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(alert_count.load(Ordering::SeqCst), 1);
}
