use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{Balance, ChartSeries, Performance, Positions, Snapshot, Trade};
use crate::series::RollingBuffer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Trading,
    Admin,
    Mobile,
}

impl FromStr for ViewKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trading" => Ok(ViewKind::Trading),
            "admin" => Ok(ViewKind::Admin),
            "mobile" => Ok(ViewKind::Mobile),
            other => Err(Error::ValidationError(format!("Unknown view: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tab {
    Trading,
    Portfolio,
    History,
    Performance,
}

impl Tab {
    pub const ALL: [Tab; 4] = [Tab::Trading, Tab::Portfolio, Tab::History, Tab::Performance];
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Tab::Trading => "trading",
            Tab::Portfolio => "portfolio",
            Tab::History => "history",
            Tab::Performance => "performance",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for Tab {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Tab::ALL
            .iter()
            .copied()
            .find(|tab| tab.to_string() == s.to_ascii_lowercase())
            .ok_or_else(|| Error::ValidationError(format!("Unknown tab: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Market,
    Balance,
    Positions,
    History,
    Performance,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::Market => "market",
            Endpoint::Balance => "balance",
            Endpoint::Positions => "positions",
            Endpoint::History => "history",
            Endpoint::Performance => "performance",
        };
        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PollStats {
    pub cycles: u64,
    pub failures: u64,
    pub last_error: Option<String>,
    pub last_update: Option<DateTime<Local>>,
}

/// All state owned by one dashboard view instance.
///
/// Fields are only changed through the transition methods below: poll result
/// application and user actions. Views never share a `ViewState`.
#[derive(Debug, Clone)]
pub struct ViewState {
    kind: ViewKind,
    snapshot: Snapshot,
    balance: Balance,
    positions: Positions,
    history: Vec<Trade>,
    performance: Performance,
    buffer: RollingBuffer,
    selected_symbol: String,
    active_tab: Tab,
    chart: ChartSeries,
    stats: PollStats,
    notice: Option<String>,
}

impl ViewState {
    pub fn new(kind: ViewKind, selected_symbol: &str, capacity: usize) -> Self {
        Self {
            kind,
            snapshot: Snapshot::new(),
            balance: Balance::default(),
            positions: Positions::new(),
            history: Vec::new(),
            performance: Performance::default(),
            buffer: RollingBuffer::new(capacity),
            selected_symbol: selected_symbol.to_string(),
            active_tab: Tab::Trading,
            chart: ChartSeries::empty(selected_symbol),
            stats: PollStats::default(),
            notice: None,
        }
    }

    pub fn kind(&self) -> ViewKind {
        self.kind
    }

    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    pub fn balance(&self) -> &Balance {
        &self.balance
    }

    pub fn positions(&self) -> &Positions {
        &self.positions
    }

    pub fn history(&self) -> &[Trade] {
        &self.history
    }

    pub fn performance(&self) -> &Performance {
        &self.performance
    }

    pub fn buffer(&self) -> &RollingBuffer {
        &self.buffer
    }

    pub fn selected_symbol(&self) -> &str {
        &self.selected_symbol
    }

    pub fn active_tab(&self) -> Tab {
        self.active_tab
    }

    pub fn chart(&self) -> &ChartSeries {
        &self.chart
    }

    pub fn stats(&self) -> &PollStats {
        &self.stats
    }

    /// Last user-facing message (order outcome, validation failure).
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn begin_cycle(&mut self) {
        self.stats.cycles += 1;
    }

    /// Replaces the market snapshot and appends one point per symbol to the
    /// rolling buffer.
    pub fn apply_market(&mut self, snapshot: Snapshot, label: &str) {
        for (symbol, ticker) in &snapshot {
            self.buffer.observe(symbol, ticker.price, label);
            metrics::LAST_PRICE.with_label_values(&[symbol.as_str()]).set(ticker.price);
        }
        self.snapshot = snapshot;
        self.refresh_chart();
        self.touch();
    }

    pub fn apply_balance(&mut self, balance: Balance) {
        self.balance = balance;
        self.touch();
    }

    pub fn apply_positions(&mut self, positions: Positions) {
        self.positions = positions;
        self.touch();
    }

    pub fn apply_history(&mut self, history: Vec<Trade>) {
        self.history = history;
        self.touch();
    }

    pub fn apply_performance(&mut self, performance: Performance) {
        self.performance = performance;
        self.touch();
    }

    /// Stale data is left in place; only the counters move.
    pub fn record_failure(&mut self, endpoint: Endpoint, error: &Error) {
        self.stats.failures += 1;
        self.stats.last_error = Some(format!("{}: {}", endpoint, error));
    }

    /// Changes the chart projection only; no buffer is touched.
    pub fn select_symbol(&mut self, symbol: &str) {
        self.selected_symbol = symbol.to_string();
        self.refresh_chart();
    }

    pub fn select_tab(&mut self, tab: Tab) {
        self.active_tab = tab;
    }

    pub fn set_notice(&mut self, message: impl Into<String>) {
        self.notice = Some(message.into());
    }

    pub fn clear_notice(&mut self) {
        self.notice = None;
    }

    fn refresh_chart(&mut self) {
        self.chart = self.buffer.to_chart_series(&self.selected_symbol);
    }

    fn touch(&mut self) {
        self.stats.last_update = Some(Local::now());
    }
}
