use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;

use crate::error::Result;
use crate::models::{Balance, Order, OrderResponse, Performance, Positions, Snapshot, Trade};

pub mod client;
pub mod simulated;

pub use client::HttpDashboardClient;
pub use simulated::SimulatedSource;

/// Everything a dashboard view reads, plus the single write it can make.
///
/// Each call is independent; implementations give no consistency guarantee
/// between, say, the balance and the positions they return.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait DashboardApi: Send + Sync {
    async fn fetch_market(&self) -> Result<Snapshot>;

    async fn fetch_balance(&self) -> Result<Balance>;

    async fn fetch_positions(&self) -> Result<Positions>;

    async fn fetch_history(&self) -> Result<Vec<Trade>>;

    async fn fetch_performance(&self) -> Result<Performance>;

    /// Sends one order. A well-formed rejection comes back as `Ok` with
    /// `success == false`; transport and protocol failures are `Err`.
    async fn submit_order(&self, order: &Order) -> Result<OrderResponse>;
}
