use crate::engine::TradingEngine;
use crate::metrics;
use crate::models::{Order, Side};
use warp::hyper::body::Bytes;
use log::{error, info, warn};
use serde_json::{json, Value};
use std::convert::Infallible;
use std::sync::Arc;
use warp::http::StatusCode;
use warp::{Filter, Rejection, Reply};

const MAX_BODY_BYTES: u64 = 16 * 1024;

fn with_engine(
    engine: Arc<TradingEngine>,
) -> impl Filter<Extract = (Arc<TradingEngine>,), Error = Infallible> + Clone {
    warp::any().map(move || engine.clone())
}

/// `/api/*`, `/health` and `/metrics`.
pub fn routes(
    engine: Arc<TradingEngine>,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let status = warp::path!("api" / "status")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .map(|engine: Arc<TradingEngine>| warp::reply::json(&engine.status()));

    let market = warp::path!("api" / "market")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(get_market);

    let balance = warp::path!("api" / "balance")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(get_balance);

    let positions = warp::path!("api" / "positions")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(get_positions);

    let history = warp::path!("api" / "history")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(get_history);

    let performance = warp::path!("api" / "performance")
        .and(warp::get())
        .and(with_engine(engine.clone()))
        .and_then(get_performance);

    let order = warp::path!("api" / "order")
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_BODY_BYTES))
        .and(warp::body::bytes())
        .and(with_engine(engine))
        .and_then(place_order);

    let health = warp::path!("health").and(warp::get()).map(|| {
        warp::reply::json(&json!({
            "status": "ok",
            "timestamp": chrono::Utc::now().to_rfc3339()
        }))
    });

    let metrics_route = warp::path!("metrics").and(warp::get()).map(|| match metrics::gather() {
        Ok(text) => warp::reply::with_status(text, StatusCode::OK),
        Err(e) => {
            error!("Failed to gather metrics: {}", e);
            warp::reply::with_status("Error gathering metrics".to_string(), StatusCode::INTERNAL_SERVER_ERROR)
        }
    });

    status
        .or(market)
        .or(balance)
        .or(positions)
        .or(history)
        .or(performance)
        .or(order)
        .or(health)
        .or(metrics_route)
        .with(warp::cors().allow_any_origin().allow_methods(vec!["GET", "POST"]).allow_header("content-type"))
}

async fn get_market(engine: Arc<TradingEngine>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&engine.market().await))
}

async fn get_balance(engine: Arc<TradingEngine>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&engine.balance().await))
}

async fn get_positions(engine: Arc<TradingEngine>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&engine.positions().await))
}

async fn get_history(engine: Arc<TradingEngine>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&engine.history().await))
}

async fn get_performance(engine: Arc<TradingEngine>) -> Result<impl Reply, Infallible> {
    Ok(warp::reply::json(&engine.performance().await))
}

fn error_reply(message: &str, status: StatusCode) -> warp::reply::WithStatus<warp::reply::Json> {
    warp::reply::with_status(warp::reply::json(&json!({ "error": message })), status)
}

/// Checks an order body the way the order form would: symbol, side and a
/// positive quantity must all be present; quantity may be a number or a
/// numeric string.
pub fn parse_order_request(body: &Value) -> Result<Order, String> {
    let symbol = body.get("symbol").and_then(Value::as_str).map(str::trim).unwrap_or("");
    let side = body.get("side").and_then(Value::as_str).map(str::trim).unwrap_or("");
    let quantity = match body.get("quantity") {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse::<f64>().map_err(|_| "Invalid parameters".to_string())?,
        _ => 0.0,
    };

    if symbol.is_empty() || side.is_empty() || !(quantity > 0.0) || !quantity.is_finite() {
        return Err("Invalid parameters".to_string());
    }
    let side: Side = side.parse().map_err(|_| "Invalid side".to_string())?;

    Ok(Order { symbol: symbol.to_string(), side, quantity })
}

async fn place_order(body: Bytes, engine: Arc<TradingEngine>) -> Result<impl Reply, Infallible> {
    let value: Value = match serde_json::from_slice(&body) {
        Ok(value @ Value::Object(_)) => value,
        _ => return Ok(error_reply("No data provided", StatusCode::BAD_REQUEST)),
    };

    let order = match parse_order_request(&value) {
        Ok(order) => order,
        Err(message) => {
            warn!("Rejected order request {}: {}", value, message);
            return Ok(error_reply(&message, StatusCode::BAD_REQUEST));
        }
    };

    let response = engine.place_order(&order).await;
    if let Some(reason) = response.error.as_deref() {
        info!("Engine rejected {} {} {}: {}", order.side, order.quantity, order.symbol, reason);
        return Ok(error_reply(reason, StatusCode::BAD_REQUEST));
    }
    Ok(warp::reply::with_status(warp::reply::json(&response), StatusCode::OK))
}
