//! 订单执行适配器契约
//!
//! Live与Paper实现同一接口，调用方对模式无感知。
//! 模式到适配器的映射在每次调用时由执行引擎查表决定。

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::order::Order;

#[async_trait]
pub trait ExecutionAdapter: Send + Sync {
    /// 市价下单，返回更新后的订单（含exchange_order_id）
    async fn place_market(&self, order: &Order) -> Result<Order>;

    /// 限价下单
    async fn place_limit(&self, order: &Order) -> Result<Order>;

    /// 止损下单
    async fn place_stop_loss(&self, order: &Order) -> Result<Order>;

    /// 撤单
    async fn cancel_order(&self, order: &Order) -> Result<Order>;

    /// 查询订单最新状态
    async fn query_order(&self, order: &Order) -> Result<Order>;

    /// 可用余额
    async fn get_balance(&self) -> Result<f64>;

    /// 适配器名称，日志用
    fn name(&self) -> &'static str;
}
