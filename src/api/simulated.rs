//! Locally fabricated dashboard data.
//!
//! Prices are drawn fresh each call around a fixed base, the way the static
//! demo pages fake a live market. Nothing here is stateful apart from the
//! order counter, so consecutive snapshots are unrelated.

use async_trait::async_trait;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::api::DashboardApi;
use crate::error::Result;
use crate::models::{
    Balance, Order, OrderResponse, Performance, Position, Positions, Side, Snapshot, Ticker, Trade,
};

/// (symbol, base price, spread, volume)
const MARKETS: [(&str, f64, f64, f64); 4] = [
    ("BTC/USDT", 45_000.0, 1_000.0, 1_000_000.0),
    ("ETH/USDT", 3_000.0, 100.0, 2_000_000.0),
    ("BNB/USDT", 300.0, 20.0, 500_000.0),
    ("SOL/USDT", 110.0, 10.0, 800_000.0),
];

#[derive(Debug)]
pub struct SimulatedSource {
    order_delay: Duration,
    orders_sent: AtomicU64,
}

impl Default for SimulatedSource {
    fn default() -> Self {
        Self::new(Duration::from_millis(1_000))
    }
}

impl SimulatedSource {
    pub fn new(order_delay: Duration) -> Self {
        Self {
            order_delay,
            orders_sent: AtomicU64::new(0),
        }
    }

    pub fn symbols() -> Vec<String> {
        MARKETS.iter().map(|(symbol, ..)| symbol.to_string()).collect()
    }

    pub fn orders_sent(&self) -> u64 {
        self.orders_sent.load(Ordering::SeqCst)
    }

    fn random_snapshot() -> Snapshot {
        let mut rng = rand::thread_rng();
        MARKETS
            .iter()
            .map(|&(symbol, base, spread, volume)| {
                let ticker = Ticker {
                    price: base + rng.gen::<f64>() * spread,
                    change: (rng.gen::<f64>() - 0.5) * 5.0,
                    volume,
                };
                (symbol.to_string(), ticker)
            })
            .collect()
    }

    fn random_balance() -> Balance {
        let mut rng = rand::thread_rng();
        Balance {
            total: 15_000.0 + rng.gen::<f64>() * 5_000.0,
            available: 10_000.0 + rng.gen::<f64>() * 2_000.0,
            pnl: (rng.gen::<f64>() - 0.5) * 2_000.0,
            currency: Some("USDT".to_string()),
        }
    }

    fn random_positions(snapshot: &Snapshot) -> Positions {
        let mut rng = rand::thread_rng();
        let holdings = [("BTC/USDT", 0.1, 0.2), ("ETH/USDT", 2.0, 3.0)];
        holdings
            .iter()
            .filter_map(|&(symbol, min, range)| {
                let price = snapshot.get(symbol)?.price;
                let quantity = min + rng.gen::<f64>() * range;
                Some((
                    symbol.to_string(),
                    Position { quantity, current_price: price, value: quantity * price },
                ))
            })
            .collect()
    }
}

fn fixed_history() -> Vec<Trade> {
    let row = |id, symbol: &str, side, quantity, price: f64, datetime: &str| Trade {
        id,
        symbol: symbol.to_string(),
        side,
        quantity,
        price,
        total: quantity * price,
        datetime: datetime.to_string(),
        timestamp: None,
        profit: None,
    };
    vec![
        row(1, "BTC/USDT", Side::Buy, 0.1, 44_500.0, "2023-11-15 10:30:00"),
        row(2, "ETH/USDT", Side::Buy, 2.0, 2_950.0, "2023-11-15 11:45:00"),
        row(3, "BNB/USDT", Side::Sell, 10.0, 290.0, "2023-11-15 14:20:00"),
    ]
}

#[async_trait]
impl DashboardApi for SimulatedSource {
    async fn fetch_market(&self) -> Result<Snapshot> {
        Ok(Self::random_snapshot())
    }

    async fn fetch_balance(&self) -> Result<Balance> {
        Ok(Self::random_balance())
    }

    async fn fetch_positions(&self) -> Result<Positions> {
        Ok(Self::random_positions(&Self::random_snapshot()))
    }

    async fn fetch_history(&self) -> Result<Vec<Trade>> {
        Ok(fixed_history())
    }

    async fn fetch_performance(&self) -> Result<Performance> {
        Ok(Performance {
            total_trades: 156,
            winning_trades: 107,
            win_rate: 68.5,
            total_volume: 1_250_000.0,
        })
    }

    async fn submit_order(&self, order: &Order) -> Result<OrderResponse> {
        self.orders_sent.fetch_add(1, Ordering::SeqCst);
        log::info!("Simulating {} of {} {}", order.side, order.quantity, order.symbol);
        tokio::time::sleep(self.order_delay).await;
        Ok(OrderResponse { success: true, error: None, trade: None })
    }
}
