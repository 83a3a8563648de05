pub mod enums;
pub mod events;
pub mod order;
pub mod portfolio;
pub mod position;
pub mod signal;
pub mod tick;

pub use enums::{BusMode, OrderSide, OrderStatus, OrderType, PositionSide, TradingMode};
pub use events::{BusEvent, HealthEvent, HealthStatus, KillSwitchEvent, RiskAlertEvent};
pub use order::Order;
pub use portfolio::PortfolioSnapshot;
pub use position::Position;
pub use signal::{SignalAction, TradeSignal};
pub use tick::Tick;
