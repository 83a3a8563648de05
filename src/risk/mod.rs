pub mod drawdown;
pub mod engine;
pub mod kill_switch;
pub mod position_sizer;

pub use drawdown::DrawdownMonitor;
pub use engine::{RiskEngine, RiskEvaluationResult};
pub use kill_switch::KillSwitchManager;
pub use position_sizer::PositionSizer;
