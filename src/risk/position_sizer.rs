//! 仓位计算
//!
//! 数量 = (权益 × min(请求风险%, 最大风险%)) / |入场价 - 止损价|，
//! 夹到[最小下单量, 最大下单量]，按固定精度截断。

use crate::app_config::settings::RiskSettings;

pub struct PositionSizer {
    settings: RiskSettings,
}

impl PositionSizer {
    pub fn new(settings: RiskSettings) -> Self {
        Self { settings }
    }

    /// 计算下单数量。结果≤0（含止损价等于入场价）返回None，由调用方拒绝
    pub fn calculate(
        &self,
        equity: f64,
        entry_price: f64,
        stop_loss: f64,
        requested_risk_percent: f64,
    ) -> Option<f64> {
        let stop_distance = (entry_price - stop_loss).abs();
        if stop_distance <= 0.0 || equity <= 0.0 {
            return None;
        }

        let risk_percent = requested_risk_percent.min(self.settings.max_risk_percent);
        if risk_percent <= 0.0 {
            return None;
        }

        let risk_amount = equity * risk_percent / 100.0;
        let raw_quantity = risk_amount / stop_distance;

        let clamped = raw_quantity
            .max(self.settings.min_order_size)
            .min(self.settings.max_order_size);

        let rounded = Self::truncate(clamped, self.settings.quantity_precision);
        if rounded <= 0.0 {
            return None;
        }
        Some(rounded)
    }

    /// 按精度截断（不四舍五入，下单数量宁小勿大）
    fn truncate(value: f64, precision: u32) -> f64 {
        let factor = 10f64.powi(precision as i32);
        (value * factor).floor() / factor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings() -> RiskSettings {
        RiskSettings {
            max_risk_percent: 2.0,
            max_drawdown_percent: 20.0,
            min_risk_reward_ratio: 1.5,
            max_open_positions: 5,
            min_order_size: 0.0001,
            max_order_size: 100.0,
            quantity_precision: 4,
        }
    }

    #[test]
    fn test_two_percent_risk_sizing() {
        // equity=10000, entry=50000, stop=49000, risk=2% → (10000×0.02)/1000 = 0.2
        let sizer = PositionSizer::new(settings());
        let qty = sizer.calculate(10000.0, 50000.0, 49000.0, 2.0).unwrap();
        assert_relative_eq!(qty, 0.2);
    }

    #[test]
    fn test_requested_risk_capped_by_max() {
        let sizer = PositionSizer::new(settings());
        // 请求5%但上限2%，结果同2%
        let qty = sizer.calculate(10000.0, 50000.0, 49000.0, 5.0).unwrap();
        assert_relative_eq!(qty, 0.2);
    }

    #[test]
    fn test_clamped_to_max_order_size() {
        let mut s = settings();
        s.max_order_size = 0.1;
        let sizer = PositionSizer::new(s);
        let qty = sizer.calculate(10000.0, 50000.0, 49000.0, 2.0).unwrap();
        assert_relative_eq!(qty, 0.1);
    }

    #[test]
    fn test_zero_stop_distance_is_none() {
        let sizer = PositionSizer::new(settings());
        assert!(sizer.calculate(10000.0, 50000.0, 50000.0, 2.0).is_none());
    }

    #[test]
    fn test_zero_equity_is_none() {
        let sizer = PositionSizer::new(settings());
        assert!(sizer.calculate(0.0, 50000.0, 49000.0, 2.0).is_none());
    }

    #[test]
    fn test_precision_truncation() {
        let sizer = PositionSizer::new(settings());
        // (10000×0.02)/1234.56789 = 0.162...，截断到4位
        let qty = sizer.calculate(10000.0, 50000.0, 48765.43211, 2.0).unwrap();
        let factor = 10f64.powi(4);
        assert_relative_eq!(qty, (qty * factor).floor() / factor);
    }
}
