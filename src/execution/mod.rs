pub mod adapter;
pub mod circuit_breaker;
pub mod engine;
pub mod live_adapter;
pub mod mode;
pub mod order_tracker;
pub mod paper_adapter;
pub mod position_tracker;

pub use adapter::ExecutionAdapter;
pub use circuit_breaker::{CircuitBreaker, CircuitState};
pub use engine::ExecutionEngine;
pub use live_adapter::LiveAdapter;
pub use mode::TradingModeManager;
pub use order_tracker::OrderTracker;
pub use paper_adapter::PaperAdapter;
pub use position_tracker::PositionTracker;
