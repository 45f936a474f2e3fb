use std::sync::Arc;
use std::time::Duration;

use trading_dashboard::config::PollerConfig;
use trading_dashboard::engine::TradingEngine;
use trading_dashboard::web::server::RunningServer;
use trading_dashboard::web::WebServer;

pub const INITIAL_CASH: f64 = 10_000.0;

/// A demo backend on a free local port whose prices never move during a test.
pub fn spawn_backend() -> RunningServer {
    let engine = Arc::new(TradingEngine::with_seed(INITIAL_CASH, 42));
    WebServer::new(engine, Duration::from_secs(3_600))
        .spawn(([127, 0, 0, 1], 0).into())
        .expect("bind demo backend")
}

pub fn fast_poller(symbol: &str) -> PollerConfig {
    PollerConfig {
        interval_ms: 50,
        capacity: 5,
        selected_symbol: symbol.to_string(),
    }
}
