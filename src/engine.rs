//! In-memory paper exchange backing the demo API.
//!
//! Prices follow a bounded random walk, orders fill instantly at the current
//! price against a single cash balance, and nothing survives a restart.

use chrono::{Local, Utc};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use crate::models::{
    Balance, Order, OrderResponse, Performance, Position, Positions, Side, Snapshot, Ticker, Trade,
};

pub const QUOTE_CURRENCY: &str = "USDT";
pub const HISTORY_LIMIT: usize = 20;
const MIN_PRICE: f64 = 0.01;
const MAX_TICK_CHANGE_PCT: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusReport {
    pub status: String,
    pub version: String,
    pub timestamp: f64,
    pub server_time: String,
}

#[derive(Debug, Clone, Copy, Default)]
struct Holding {
    quantity: f64,
    avg_price: f64,
}

#[derive(Debug)]
struct EngineState {
    cash: f64,
    holdings: BTreeMap<String, Holding>,
    trades: Vec<Trade>,
    market: Snapshot,
    rng: StdRng,
}

#[derive(Debug)]
pub struct TradingEngine {
    initial_cash: f64,
    state: RwLock<EngineState>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn default_market() -> Snapshot {
    [
        ("BTC/USDT", 45_000.0, 2.5, 28_492.0),
        ("ETH/USDT", 2_500.0, -1.2, 15_932.0),
        ("ADA/USDT", 0.45, 0.8, 8_921.0),
        ("DOT/USDT", 6.5, 3.1, 4_532.0),
        ("SOL/USDT", 120.5, 5.2, 12_345.0),
    ]
    .iter()
    .map(|&(symbol, price, change, volume)| (symbol.to_string(), Ticker { price, change, volume }))
    .collect()
}

impl TradingEngine {
    pub fn new(initial_cash: f64) -> Self {
        Self::with_rng(initial_cash, StdRng::from_entropy())
    }

    /// Reproducible price walk, for tests.
    pub fn with_seed(initial_cash: f64, seed: u64) -> Self {
        Self::with_rng(initial_cash, StdRng::seed_from_u64(seed))
    }

    fn with_rng(initial_cash: f64, rng: StdRng) -> Self {
        Self {
            initial_cash,
            state: RwLock::new(EngineState {
                cash: initial_cash,
                holdings: BTreeMap::new(),
                trades: Vec::new(),
                market: default_market(),
                rng,
            }),
        }
    }

    /// Moves every price by a random step of at most ±2%.
    pub async fn tick(&self) {
        let mut state = self.state.write().await;
        let EngineState { market, rng, .. } = &mut *state;
        for (symbol, ticker) in market.iter_mut() {
            let change = rng.gen_range(-MAX_TICK_CHANGE_PCT..=MAX_TICK_CHANGE_PCT);
            let price = (ticker.price * (1.0 + change / 100.0)).max(MIN_PRICE);
            ticker.price = round2(price);
            ticker.change = round2(change);
            ticker.volume = rng.gen_range(1_000..=30_000) as f64;
            debug!("{} -> {:.2} ({:+.2}%)", symbol, ticker.price, ticker.change);
        }
    }

    pub async fn market(&self) -> Snapshot {
        self.state.read().await.market.clone()
    }

    pub async fn balance(&self) -> Balance {
        let state = self.state.read().await;
        let holdings_value: f64 = state
            .holdings
            .iter()
            .filter_map(|(symbol, holding)| state.market.get(symbol).map(|t| t.price * holding.quantity))
            .sum();
        let total = state.cash + holdings_value;
        Balance {
            total: round2(total),
            available: round2(state.cash),
            pnl: round2(total - self.initial_cash),
            currency: Some(QUOTE_CURRENCY.to_string()),
        }
    }

    pub async fn positions(&self) -> Positions {
        let state = self.state.read().await;
        state
            .holdings
            .iter()
            .filter_map(|(symbol, holding)| {
                let price = state.market.get(symbol)?.price;
                Some((
                    symbol.clone(),
                    Position {
                        quantity: holding.quantity,
                        current_price: price,
                        value: round2(price * holding.quantity),
                    },
                ))
            })
            .collect()
    }

    /// The most recent trades, oldest first.
    pub async fn history(&self) -> Vec<Trade> {
        let state = self.state.read().await;
        let skip = state.trades.len().saturating_sub(HISTORY_LIMIT);
        state.trades[skip..].to_vec()
    }

    pub async fn performance(&self) -> Performance {
        let state = self.state.read().await;
        let total_trades = state.trades.len() as u64;
        let winning_trades = state
            .trades
            .iter()
            .filter(|t| t.profit.unwrap_or(0.0) > 0.0)
            .count() as u64;
        let win_rate = if total_trades > 0 {
            round2(winning_trades as f64 / total_trades as f64 * 100.0)
        } else {
            0.0
        };
        Performance {
            total_trades,
            winning_trades,
            win_rate,
            total_volume: round2(state.trades.iter().map(|t| t.total).sum()),
        }
    }

    pub fn status(&self) -> StatusReport {
        StatusReport {
            status: "running".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now().timestamp_millis() as f64 / 1000.0,
            server_time: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }

    /// Fills `order` at the current price, or explains why it cannot.
    pub async fn place_order(&self, order: &Order) -> OrderResponse {
        if !order.quantity.is_finite() || order.quantity <= 0.0 {
            return OrderResponse::rejected("Invalid parameters");
        }
        let mut state = self.state.write().await;

        let Some(price) = state.market.get(&order.symbol).map(|t| t.price) else {
            return OrderResponse::rejected("Invalid symbol");
        };
        let total_cost = price * order.quantity;
        let held = state.holdings.get(&order.symbol).map_or(0.0, |h| h.quantity);

        let profit = match order.side {
            Side::Buy => {
                if total_cost > state.cash {
                    return OrderResponse::rejected("Insufficient balance");
                }
                state.cash -= total_cost;
                let holding = state.holdings.entry(order.symbol.clone()).or_default();
                let cost_basis = holding.avg_price * holding.quantity + total_cost;
                holding.quantity += order.quantity;
                holding.avg_price = cost_basis / holding.quantity;
                None
            }
            Side::Sell => {
                if held < order.quantity {
                    return OrderResponse::rejected("Insufficient position");
                }
                state.cash += total_cost;
                let mut realized = 0.0;
                if let Some(holding) = state.holdings.get_mut(&order.symbol) {
                    realized = (price - holding.avg_price) * order.quantity;
                    holding.quantity -= order.quantity;
                    if holding.quantity.abs() < f64::EPSILON {
                        state.holdings.remove(&order.symbol);
                    }
                }
                Some(round2(realized))
            }
        };

        let trade = Trade {
            id: state.trades.len() as u64 + 1,
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
            total: round2(total_cost),
            datetime: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            timestamp: Some(Utc::now().timestamp_millis() as f64 / 1000.0),
            profit,
        };
        state.trades.push(trade.clone());
        info!("Filled {} {} {} @ {:.2}", trade.side, trade.quantity, trade.symbol, trade.price);
        OrderResponse::filled(trade)
    }
}

/// Drives `engine.tick()` every `every`, starting one period from now.
pub fn spawn_ticker(engine: Arc<TradingEngine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let start = tokio::time::Instant::now() + every;
        let mut ticker = tokio::time::interval_at(start, every);
        loop {
            ticker.tick().await;
            engine.tick().await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(symbol: &str, side: Side, quantity: f64) -> Order {
        Order { symbol: symbol.to_string(), side, quantity }
    }

    #[tokio::test]
    async fn test_initial_state() {
        let engine = TradingEngine::with_seed(10_000.0, 7);
        let market = engine.market().await;
        assert_eq!(market.len(), 5);
        assert_eq!(market["BTC/USDT"].price, 45_000.0);

        let balance = engine.balance().await;
        assert_eq!(balance.total, 10_000.0);
        assert_eq!(balance.pnl, 0.0);
        assert_eq!(balance.currency.as_deref(), Some("USDT"));

        let performance = engine.performance().await;
        assert_eq!(performance.total_trades, 0);
        assert_eq!(performance.win_rate, 0.0);
    }

    #[tokio::test]
    async fn test_buy_then_sell_round_trip() {
        let engine = TradingEngine::with_seed(10_000.0, 7);

        let bought = engine.place_order(&order("ETH/USDT", Side::Buy, 2.0)).await;
        assert!(bought.success);
        assert_eq!(engine.balance().await.available, 5_000.0);
        assert_eq!(engine.positions().await["ETH/USDT"].value, 5_000.0);

        let sold = engine.place_order(&order("ETH/USDT", Side::Sell, 2.0)).await;
        assert!(sold.success);
        assert!(engine.positions().await.is_empty());
        assert_eq!(engine.balance().await.available, 10_000.0);

        let history = engine.history().await;
        assert_eq!(history.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(engine.performance().await.total_volume, 10_000.0);
    }

    #[tokio::test]
    async fn test_rejections() {
        let engine = TradingEngine::with_seed(10_000.0, 7);
        let cases = [
            (order("XRP/USDT", Side::Buy, 1.0), "Invalid symbol"),
            (order("BTC/USDT", Side::Buy, 1.0), "Insufficient balance"),
            (order("SOL/USDT", Side::Sell, 1.0), "Insufficient position"),
            (order("ETH/USDT", Side::Buy, -5.0), "Invalid parameters"),
            (order("ETH/USDT", Side::Buy, 0.0), "Invalid parameters"),
            (order("ETH/USDT", Side::Buy, f64::NAN), "Invalid parameters"),
            (order("ETH/USDT", Side::Sell, f64::INFINITY), "Invalid parameters"),
        ];
        for (order, reason) in cases {
            let response = engine.place_order(&order).await;
            assert!(!response.success);
            assert_eq!(response.error.as_deref(), Some(reason));
        }
        assert!(engine.history().await.is_empty());
        assert!(engine.positions().await.is_empty());
        assert_eq!(engine.balance().await.available, 10_000.0);
    }

    #[tokio::test]
    async fn test_profitable_sell_counts_as_win() {
        let engine = TradingEngine::with_seed(10_000.0, 11);
        engine.place_order(&order("SOL/USDT", Side::Buy, 10.0)).await;
        {
            let mut state = engine.state.write().await;
            state.market.get_mut("SOL/USDT").unwrap().price = 130.5;
        }
        let sold = engine.place_order(&order("SOL/USDT", Side::Sell, 5.0)).await;
        assert_eq!(sold.trade.unwrap().profit, Some(50.0));

        let performance = engine.performance().await;
        assert_eq!(performance.total_trades, 2);
        assert_eq!(performance.winning_trades, 1);
        assert_eq!(performance.win_rate, 50.0);
        assert_eq!(engine.positions().await["SOL/USDT"].quantity, 5.0);
    }

    #[tokio::test]
    async fn test_history_keeps_last_twenty() {
        let engine = TradingEngine::with_seed(1_000_000.0, 3);
        for _ in 0..25 {
            assert!(engine.place_order(&order("DOT/USDT", Side::Buy, 1.0)).await.success);
        }
        let history = engine.history().await;
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history.first().map(|t| t.id), Some(6));
        assert_eq!(history.last().map(|t| t.id), Some(25));
    }

    #[tokio::test]
    async fn test_tick_moves_prices_within_bounds() {
        let engine = TradingEngine::with_seed(10_000.0, 42);
        let before = engine.market().await;
        for _ in 0..100 {
            engine.tick().await;
        }
        let after = engine.market().await;
        for (symbol, ticker) in &after {
            assert!(ticker.price >= MIN_PRICE, "{} fell below floor", symbol);
            assert!(ticker.change.abs() <= MAX_TICK_CHANGE_PCT);
            assert!((1_000.0..=30_000.0).contains(&ticker.volume));
        }
        assert_ne!(before["BTC/USDT"].price, after["BTC/USDT"].price);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_waits_one_period_first() {
        let engine = Arc::new(TradingEngine::with_seed(10_000.0, 5));
        let handle = spawn_ticker(engine.clone(), Duration::from_secs(3));

        tokio::time::sleep(Duration::from_millis(2_900)).await;
        assert_eq!(engine.market().await["BTC/USDT"].change, 2.5);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_ne!(engine.market().await, default_market());
        handle.abort();
    }
}
