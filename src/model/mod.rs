pub mod order_history;
pub mod portfolio_snapshot;
