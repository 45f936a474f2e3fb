use log::{error, info};

use crate::api::DashboardApi;
use crate::error::{Error, Result};
use crate::metrics;
use crate::models::{Order, OrderResponse, Side};

pub const INVALID_QUANTITY: &str = "Please enter a valid quantity";

/// Raw order input as typed by a user; the quantity is still text.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderForm {
    pub symbol: String,
    pub side: Side,
    pub quantity: String,
}

impl OrderForm {
    pub fn new(symbol: &str, side: Side, quantity: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            quantity: quantity.to_string(),
        }
    }

    /// Empty or unparseable quantities are treated like non-positive ones.
    pub fn parse(&self) -> Result<Order> {
        let quantity = self
            .quantity
            .trim()
            .parse::<f64>()
            .map_err(|_| Error::ValidationError(INVALID_QUANTITY.to_string()))?;
        let order = Order {
            symbol: self.symbol.trim().to_string(),
            side: self.side,
            quantity,
        };
        validate(&order)?;
        Ok(order)
    }
}

pub fn validate(order: &Order) -> Result<()> {
    if !order.quantity.is_finite() || order.quantity <= 0.0 {
        return Err(Error::ValidationError(INVALID_QUANTITY.to_string()));
    }
    if order.symbol.trim().is_empty() {
        return Err(Error::ValidationError("Symbol cannot be empty".to_string()));
    }
    Ok(())
}

/// Validates `order` and, only if it passes, sends it exactly once.
///
/// A remote rejection becomes [`Error::OrderRejected`]. Nothing is retried.
pub async fn submit_order(api: &dyn DashboardApi, order: &Order) -> Result<OrderResponse> {
    if let Err(e) = validate(order) {
        metrics::ORDERS_REJECTED.with_label_values(&["local"]).inc();
        return Err(e);
    }

    metrics::ORDERS_SUBMITTED.inc();
    info!("Submitting {} {} {}", order.side, order.quantity, order.symbol);

    let response = api.submit_order(order).await.map_err(|e| {
        error!("Order submission failed: {}", e);
        e
    })?;

    if !response.success {
        metrics::ORDERS_REJECTED.with_label_values(&["remote"]).inc();
        let reason = response.error.unwrap_or_else(|| "Order was not accepted".to_string());
        error!("Order rejected: {}", reason);
        return Err(Error::OrderRejected(reason));
    }
    Ok(response)
}

/// User-facing confirmation for a filled order.
pub fn success_message(order: &Order) -> String {
    let action = match order.side {
        Side::Buy => "Bought",
        Side::Sell => "Sold",
    };
    format!("Order executed! {} {} {}", action, order.quantity, order.symbol)
}

/// User-facing text for a failed order.
pub fn failure_message(err: &Error) -> String {
    match err {
        Error::ValidationError(msg) => msg.clone(),
        Error::OrderRejected(msg) => format!("Order error: {}", msg),
        other => format!("Order error: {}", other),
    }
}
