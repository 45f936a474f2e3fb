//! Bounded per-symbol price history feeding the live chart.
//!
//! Each symbol owns a fixed-capacity ring buffer of `(label, price)` points.
//! Once full, every new observation evicts the oldest one, so a series always
//! holds the most recent `capacity` observations in arrival order.

use std::collections::HashMap;
use crate::models::ChartSeries;

pub const DEFAULT_CAPACITY: usize = 30;

/// Fixed-capacity FIFO backed by a preallocated slot array and a head index.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<Option<T>>,
    head: usize,
    len: usize,
}

impl<T> RingBuffer<T> {
    /// A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || None);
        Self { slots, head: 0, len: 0 }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends `item`, returning the evicted oldest item when full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let capacity = self.capacity();
        if self.len < capacity {
            let tail = (self.head + self.len) % capacity;
            self.slots[tail] = Some(item);
            self.len += 1;
            None
        } else {
            let evicted = self.slots[self.head].replace(item);
            self.head = (self.head + 1) % capacity;
            evicted
        }
    }

    pub fn oldest(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn newest(&self) -> Option<&T> {
        self.len.checked_sub(1).and_then(|i| self.get(i))
    }

    /// Item at logical position `index`, 0 being the oldest.
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len {
            return None;
        }
        self.slots[(self.head + index) % self.capacity()].as_ref()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..self.len).filter_map(move |i| self.get(i))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricePoint {
    pub label: String,
    pub price: f64,
}

/// Rolling price history for every symbol a view has seen.
#[derive(Debug, Clone)]
pub struct RollingBuffer {
    capacity: usize,
    series: HashMap<String, RingBuffer<PricePoint>>,
}

impl Default for RollingBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl RollingBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            series: HashMap::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Records one observation. Series are created lazily on first sight of a
    /// symbol; repeated calls each add a point.
    pub fn observe(&mut self, symbol: &str, price: f64, label: impl Into<String>) {
        let capacity = self.capacity;
        let series = self
            .series
            .entry(symbol.to_string())
            .or_insert_with(|| RingBuffer::new(capacity));
        series.push(PricePoint { label: label.into(), price });
    }

    /// Labels and prices in insertion order. Unknown symbols give an empty series.
    pub fn to_chart_series(&self, symbol: &str) -> ChartSeries {
        let Some(series) = self.series.get(symbol) else {
            return ChartSeries::empty(symbol);
        };
        let (labels, values) = series
            .iter()
            .map(|point| (point.label.clone(), point.price))
            .unzip();
        ChartSeries {
            symbol: symbol.to_string(),
            labels,
            values,
        }
    }

    pub fn len(&self, symbol: &str) -> usize {
        self.series.get(symbol).map_or(0, RingBuffer::len)
    }

    pub fn latest(&self, symbol: &str) -> Option<&PricePoint> {
        self.series.get(symbol).and_then(RingBuffer::newest)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.series.keys().cloned().collect();
        symbols.sort();
        symbols
    }}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(second: usize) -> String {
        format!("10:00:{:02}", second)
    }

    #[test]
    fn test_ring_buffer_evicts_oldest() {
        let mut ring = RingBuffer::new(3);
        assert_eq!(ring.push(1), None);
        assert_eq!(ring.push(2), None);
        assert_eq!(ring.push(3), None);
        assert!(ring.is_full());
        assert_eq!(ring.push(4), Some(1));
        assert_eq!(ring.push(5), Some(2));
        assert_eq!(ring.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5]);
        assert_eq!(ring.oldest(), Some(&3));
        assert_eq!(ring.newest(), Some(&5));
        assert_eq!(ring.get(3), None);
    }

    #[test]
    fn test_ring_buffer_zero_capacity_holds_one() {
        let mut ring = RingBuffer::new(0);
        assert_eq!(ring.capacity(), 1);
        ring.push("a");
        assert_eq!(ring.push("b"), Some("a"));
        assert_eq!(ring.len(), 1);
    }

    #[test]
    fn test_thirty_first_observation_evicts_first() {
        let mut buffer = RollingBuffer::default();
        for i in 0..=30 {
            buffer.observe("BTC/USDT", 45000.0 + i as f64, label(i));
        }

        let series = buffer.to_chart_series("BTC/USDT");
        assert_eq!(series.len(), 30);
        assert_eq!(series.labels.first().map(String::as_str), Some("10:00:01"));
        assert_eq!(series.labels.last().map(String::as_str), Some("10:00:30"));
        assert_eq!(series.values.first().copied(), Some(45001.0));
        assert_eq!(series.values.last().copied(), Some(45030.0));
    }

    #[test]
    fn test_series_is_most_recent_window_for_any_length() {
        for total in [0usize, 1, 29, 30, 31, 59, 60, 61, 200] {
            let mut buffer = RollingBuffer::new(30);
            for i in 0..total {
                buffer.observe("ETH/USDT", i as f64, format!("t{}", i));
            }
            let series = buffer.to_chart_series("ETH/USDT");
            let expected: Vec<f64> = (total.saturating_sub(30)..total).map(|i| i as f64).collect();
            assert!(series.len() <= 30);
            assert_eq!(series.values, expected, "after {} observations", total);
            assert_eq!(series.labels.len(), series.values.len());
        }
    }

    #[test]
    fn test_unobserved_symbol_is_empty_not_error() {
        let buffer = RollingBuffer::default();
        let series = buffer.to_chart_series("DOGE/USDT");
        assert!(series.is_empty());
        assert_eq!(series.symbol, "DOGE/USDT");
        assert_eq!(buffer.len("DOGE/USDT"), 0);
    }

    #[test]
    fn test_duplicate_observations_are_kept() {
        let mut buffer = RollingBuffer::default();
        buffer.observe("SOL/USDT", 110.0, "10:00:00");
        buffer.observe("SOL/USDT", 110.0, "10:00:00");
        assert_eq!(buffer.len("SOL/USDT"), 2);
    }

    #[test]
    fn test_symbols_are_independent() {
        let mut buffer = RollingBuffer::new(2);
        buffer.observe("BTC/USDT", 1.0, "a");
        buffer.observe("ETH/USDT", 2.0, "a");
        buffer.observe("BTC/USDT", 3.0, "b");
        buffer.observe("BTC/USDT", 5.0, "c");

        assert_eq!(buffer.to_chart_series("BTC/USDT").values, vec![3.0, 5.0]);
        assert_eq!(buffer.to_chart_series("ETH/USDT").values, vec![2.0]);
        assert_eq!(buffer.symbols(), vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()]);
        assert_eq!(buffer.latest("BTC/USDT").map(|p| p.price), Some(5.0));
    }
}
