use prometheus::{Counter, CounterVec, Encoder, GaugeVec, Histogram, Opts, Registry, TextEncoder};
use lazy_static::lazy_static;

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    pub static ref POLL_CYCLES: Counter = Counter::new(
        "dashboard_poll_cycles_total",
        "Total number of poll cycles started"
    ).unwrap();

    pub static ref POLL_FAILURES: CounterVec = CounterVec::new(
        Opts::new("dashboard_poll_failures_total", "Failed fetches per endpoint"),
        &["endpoint"]
    ).unwrap();

    pub static ref ORDERS_SUBMITTED: Counter = Counter::new(
        "dashboard_orders_submitted_total",
        "Orders that passed local validation and were sent"
    ).unwrap();

    pub static ref ORDERS_REJECTED: CounterVec = CounterVec::new(
        Opts::new("dashboard_orders_rejected_total", "Orders rejected, by stage"),
        &["stage"]
    ).unwrap();

    pub static ref LAST_PRICE: GaugeVec = GaugeVec::new(
        Opts::new("dashboard_last_price", "Most recently observed price per symbol"),
        &["symbol"]
    ).unwrap();

    pub static ref FETCH_LATENCY: Histogram = Histogram::with_opts(
        prometheus::HistogramOpts::new(
            "dashboard_fetch_latency_seconds",
            "Latency of a single dashboard API fetch"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 3.0])
    ).unwrap();

    /// Outcome of the one-time registration, replayed to every caller.
    static ref REGISTRATION: Result<(), String> = register_all().map_err(|e| e.to_string());
}

fn register_all() -> Result<(), prometheus::Error> {
    REGISTRY.register(Box::new(POLL_CYCLES.clone()))?;
    REGISTRY.register(Box::new(POLL_FAILURES.clone()))?;
    REGISTRY.register(Box::new(ORDERS_SUBMITTED.clone()))?;
    REGISTRY.register(Box::new(ORDERS_REJECTED.clone()))?;
    REGISTRY.register(Box::new(LAST_PRICE.clone()))?;
    REGISTRY.register(Box::new(FETCH_LATENCY.clone()))?;
    Ok(())
}

/// Registers every collector once. Later calls report the same outcome.
pub fn init() -> crate::error::Result<()> {
    REGISTRATION
        .clone()
        .map_err(|e| crate::error::Error::InternalError(format!("Metrics registration failed: {}", e)))
}

/// Renders the registry in the Prometheus text exposition format.
pub fn gather() -> crate::error::Result<String> {
    init()?;
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&REGISTRY.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| crate::error::Error::InternalError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent_and_gather_exports() {
        assert!(init().is_ok());
        assert!(init().is_ok());
        POLL_CYCLES.inc();
        LAST_PRICE.with_label_values(&["BTC/USDT"]).set(45000.0);

        let text = gather().unwrap();
        assert!(text.contains("dashboard_poll_cycles_total"));
        assert!(text.contains("dashboard_last_price{symbol=\"BTC/USDT\"}"));
    }

    #[test]
    fn test_init_replays_first_registration_outcome() {
        assert!(init().is_ok());
        // init replays the first outcome instead of registering again.
        assert!(register_all().is_err());
        assert!(init().is_ok());
    }
}
