use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    pub price: f64,
    /// Percent change since the previous tick.
    pub change: f64,
    pub volume: f64,
}

/// One complete view of market prices, keyed by symbol (e.g. `BTC/USDT`).
///
/// Snapshots are replaced wholesale on every poll.
pub type Snapshot = BTreeMap<String, Ticker>;

/// Chart-ready projection of a rolling price series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    pub symbol: String,
    pub labels: Vec<String>,
    pub values: Vec<f64>,
}

impl ChartSeries {
    pub fn empty(symbol: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            labels: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<(&str, f64)> {
        self.labels.last().map(String::as_str).zip(self.values.last().copied())
    }

    pub fn min(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::min)
    }

    pub fn max(&self) -> Option<f64> {
        self.values.iter().copied().reduce(f64::max)
    }
}
