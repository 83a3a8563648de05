//! 风控引擎集成测试：检查顺序、仓位计算、订单构建

use std::sync::Arc;

use approx::assert_relative_eq;

use rust_trader::app_config::settings::RiskSettings;
use rust_trader::domain::enums::{OrderSide, OrderType, PositionSide};
use rust_trader::domain::portfolio::PortfolioSnapshot;
use rust_trader::domain::position::Position;
use rust_trader::domain::signal::{SignalAction, TradeSignal};
use rust_trader::event_bus::InProcessEventBus;
use rust_trader::risk::engine::reasons;
use rust_trader::risk::{DrawdownMonitor, KillSwitchManager, RiskEngine};

fn risk_settings() -> RiskSettings {
    RiskSettings {
        max_risk_percent: 2.0,
        max_drawdown_percent: 20.0,
        min_risk_reward_ratio: 1.5,
        max_open_positions: 2,
        min_order_size: 0.0001,
        max_order_size: 100.0,
        quantity_precision: 4,
    }
}

fn engine() -> (RiskEngine, Arc<KillSwitchManager>, Arc<DrawdownMonitor>) {
    let kill_switch = Arc::new(KillSwitchManager::new(20.0));
    let drawdown = Arc::new(DrawdownMonitor::new(10000.0));
    let bus = Arc::new(InProcessEventBus::new());
    let engine = RiskEngine::new(
        risk_settings(),
        Arc::clone(&kill_switch),
        Arc::clone(&drawdown),
        bus,
    );
    (engine, kill_switch, drawdown)
}

fn snapshot(equity: f64) -> PortfolioSnapshot {
    PortfolioSnapshot::build(equity, vec![], 0.0, 0.0)
}

fn valid_signal() -> TradeSignal {
    TradeSignal::new("BTC-USDT", SignalAction::Buy, "test-strategy")
        .with_price(50000.0)
        .with_stop_loss(49000.0)
}

#[test]
fn test_approved_order_two_percent_sizing() {
    // equity=10000, entry=50000, stop=49000, risk=2% → qty 0.2
    let (engine, _, _) = engine();
    let result = engine.evaluate_with_snapshot(&valid_signal(), Some(&snapshot(10000.0)));

    assert!(result.approved, "rejected: {:?}", result.rejection_reason);
    let order = result.approved_order.unwrap();
    assert_relative_eq!(order.quantity, 0.2);
    assert_eq!(order.side, OrderSide::Buy);
    // 给了价格 → 限价单
    assert_eq!(order.order_type, OrderType::Limit);
    assert_eq!(order.stop_price, Some(49000.0));
    assert!(order.exchange_order_id.is_none());
}

#[test]
fn test_kill_switch_rejection_comes_first() {
    let (engine, kill_switch, _) = engine();
    kill_switch.activate("manual halt");

    // 同时缺止损：kill-switch原因优先
    let signal = TradeSignal::new("BTC-USDT", SignalAction::Buy, "t").with_price(50000.0);
    let result = engine.evaluate_with_snapshot(&signal, Some(&snapshot(10000.0)));
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::KILL_SWITCH_ACTIVE)
    );
}

#[test]
fn test_drawdown_rejection_before_stop_loss_check() {
    let (engine, _, drawdown) = engine();
    // 回撤25% > 20%
    drawdown.update(7500.0);

    let signal = TradeSignal::new("BTC-USDT", SignalAction::Buy, "t").with_price(50000.0);
    let result = engine.evaluate_with_snapshot(&signal, Some(&snapshot(7500.0)));
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::DRAWDOWN_LIMIT)
    );
}

#[test]
fn test_missing_stop_loss_rejected_before_risk_reward() {
    let (engine, _, _) = engine();
    // 止盈离谱导致风险回报比不达标，但缺止损的原因必须先出现
    let signal = TradeSignal::new("BTC-USDT", SignalAction::Buy, "t")
        .with_price(50000.0)
        .with_take_profit(50001.0);
    let result = engine.evaluate_with_snapshot(&signal, Some(&snapshot(10000.0)));
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::MISSING_STOP_LOSS)
    );
    // 绝不自动补止损
    assert!(result.approved_order.is_none());
}

#[test]
fn test_snapshot_unavailable_fails_closed() {
    let (engine, _, _) = engine();
    let result = engine.evaluate_with_snapshot(&valid_signal(), None);
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::SNAPSHOT_UNAVAILABLE)
    );
}

#[test]
fn test_max_open_positions_blocks_opening_only() {
    let (engine, _, _) = engine();
    let positions = vec![
        Position::new("ETH-USDT", PositionSide::Long, 3000.0, 1.0).unwrap(),
        Position::new("SOL-USDT", PositionSide::Long, 150.0, 10.0).unwrap(),
    ];
    let snapshot = PortfolioSnapshot::build(10000.0, positions, 0.0, 0.0);

    // 开仓动作被持仓数上限拦下
    let result = engine.evaluate_with_snapshot(&valid_signal(), Some(&snapshot));
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::MAX_POSITIONS)
    );

    // 平仓动作不受限制
    let close_signal = TradeSignal::new("ETH-USDT", SignalAction::CloseLong, "t")
        .with_price(3100.0)
        .with_stop_loss(3200.0);
    let result = engine.evaluate_with_snapshot(&close_signal, Some(&snapshot));
    assert!(result.approved, "rejected: {:?}", result.rejection_reason);
    // CloseLong → Sell
    assert_eq!(result.approved_order.unwrap().side, OrderSide::Sell);
}

#[test]
fn test_risk_reward_below_minimum_rejected() {
    let (engine, _, _) = engine();
    // rr = |50500-50000| / |50000-49000| = 0.5 < 1.5
    let signal = valid_signal().with_take_profit(50500.0);
    let result = engine.evaluate_with_snapshot(&signal, Some(&snapshot(10000.0)));
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::RISK_REWARD_TOO_LOW)
    );
}

#[test]
fn test_risk_reward_at_minimum_approved() {
    let (engine, _, _) = engine();
    // rr = 1500/1000 = 1.5，恰好达标
    let signal = valid_signal().with_take_profit(51500.0);
    let result = engine.evaluate_with_snapshot(&signal, Some(&snapshot(10000.0)));
    assert!(result.approved, "rejected: {:?}", result.rejection_reason);
}

#[test]
fn test_close_short_maps_to_buy_market_order() {
    let (engine, _, _) = engine();
    // 无价格的平空信号：入场参考价取快照内持仓现价，订单为市价买入
    let mut position = Position::new("BTC-USDT", PositionSide::Short, 50000.0, 0.1).unwrap();
    position.update_price(48000.0);
    let snapshot = PortfolioSnapshot::build(10000.0, vec![position], 0.0, 0.0);

    let signal = TradeSignal::new("BTC-USDT", SignalAction::CloseShort, "t")
        .with_stop_loss(49000.0);
    let result = engine.evaluate_with_snapshot(&signal, Some(&snapshot));
    assert!(result.approved, "rejected: {:?}", result.rejection_reason);

    let order = result.approved_order.unwrap();
    assert_eq!(order.side, OrderSide::Buy);
    assert_eq!(order.order_type, OrderType::Market);
}

#[test]
fn test_zero_stop_distance_rejected_as_invalid_size() {
    let (engine, _, _) = engine();
    let signal = TradeSignal::new("BTC-USDT", SignalAction::Buy, "t")
        .with_price(50000.0)
        .with_stop_loss(50000.0);
    let result = engine.evaluate_with_snapshot(&signal, Some(&snapshot(10000.0)));
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::POSITION_SIZE_INVALID)
    );
}

#[tokio::test]
async fn test_monitor_trips_kill_switch_on_drawdown() {
    let (engine, kill_switch, drawdown) = engine();
    // 权益从10000跌到7500 → 回撤25%，监控应触发kill
    drawdown.update(7500.0);
    assert!(kill_switch.check_conditions(drawdown.current_drawdown()).is_some());
    assert!(kill_switch.is_active());

    // kill后一切信号被拒
    let result = engine.evaluate_with_snapshot(&valid_signal(), Some(&snapshot(7500.0)));
    assert_eq!(
        result.rejection_reason.as_deref(),
        Some(reasons::KILL_SWITCH_ACTIVE)
    );
}
