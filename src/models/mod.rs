use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod market;

pub use market::{ChartSeries, Snapshot, Ticker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

impl FromStr for Side {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" => Ok(Side::Buy),
            "sell" => Ok(Side::Sell),
            other => Err(crate::error::Error::ValidationError(format!("Invalid side: {}", other))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    #[serde(default)]
    pub total: f64,
    #[serde(default)]
    pub available: f64,
    #[serde(default)]
    pub pnl: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub current_price: f64,
    pub value: f64,
}

/// Open positions keyed by symbol.
pub type Positions = BTreeMap<String, Position>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub id: u64,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub price: f64,
    pub total: f64,
    pub datetime: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<f64>,
    /// Realized profit, only known for sells against an existing position.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profit: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Performance {
    #[serde(default)]
    pub total_trades: u64,
    #[serde(default)]
    pub winning_trades: u64,
    #[serde(default)]
    pub win_rate: f64,
    #[serde(default)]
    pub total_volume: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade: Option<Trade>,
}

impl OrderResponse {
    pub fn filled(trade: Trade) -> Self {
        Self { success: true, error: None, trade: Some(trade) }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self { success: false, error: Some(reason.into()), trade: None }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_side_parsing() {
        assert_eq!(" BUY ".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!("sell".parse::<Side>().unwrap(), Side::Sell);
        assert!("hold".parse::<Side>().is_err());
    }

    #[test]
    fn test_order_response_wire_format() {
        let ok: OrderResponse = serde_json::from_str(r#"{"success":true}"#).unwrap();
        assert!(ok.success);
        assert!(ok.error.is_none());

        // Rejections from the demo backend omit `success` entirely.
        let rejected: OrderResponse = serde_json::from_str(r#"{"error":"Insufficient balance"}"#).unwrap();
        assert!(!rejected.success);
        assert_eq!(rejected.error.as_deref(), Some("Insufficient balance"));
    }

    #[test]
    fn test_order_serializes_lowercase_side() {
        let order = Order { symbol: "ETH/USDT".to_string(), side: Side::Sell, quantity: 1.5 };
        let json = serde_json::to_string(&order).unwrap();
        assert_eq!(json, r#"{"symbol":"ETH/USDT","side":"sell","quantity":1.5}"#);
    }
}
