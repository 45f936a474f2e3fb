//! Fixed-interval refresh driving a dashboard view.
//!
//! A [`PollLoop`] owns one background task. On start the task refreshes
//! immediately, then once per interval, until [`PollLoop::stop`] is called or
//! the loop is dropped. Within a cycle the five fetches run concurrently and
//! each result is applied as soon as it arrives, so the view may briefly show
//! a mix of old and new data.
//!
//! Every state mutation checks the `closed` flag while holding the write
//! lock, and `stop` raises that flag under the same lock. Once `stop`
//! returns, a request still in flight can no longer touch the view.
//!
//! Subscribers get the number of completed cycles through a `watch` channel,
//! bumped after every result of a cycle has been applied.

use chrono::Local;
use log::{debug, info, warn};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify, RwLock};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::api::DashboardApi;
use crate::error::{Error, Result};
use crate::metrics;
use crate::view::{Endpoint, ViewState};

pub const LABEL_FORMAT: &str = "%H:%M:%S";

#[derive(Clone)]
struct Shared {
    state: Arc<RwLock<ViewState>>,
    closed: Arc<AtomicBool>,
    completed: Arc<watch::Sender<u64>>,
}

impl Shared {
    /// Runs `f` against the view unless the loop has been torn down.
    async fn apply<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut ViewState),
    {
        let mut state = self.state.write().await;
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        f(&mut state);
        true
    }

    async fn apply_result<T, F>(&self, endpoint: Endpoint, result: Result<T>, on_ok: F)
    where
        F: FnOnce(&mut ViewState, T),
    {
        let applied = match result {
            Ok(value) => self.apply(|state| on_ok(state, value)).await,
            Err(e) => {
                warn!("Failed to fetch {}: {}", endpoint, e);
                let name = endpoint.to_string();
                metrics::POLL_FAILURES.with_label_values(&[name.as_str()]).inc();
                self.apply(|state| state.record_failure(endpoint, &e)).await
            }
        };
        if !applied {
            debug!("Dropped late {} result after teardown", endpoint);
        }
    }
}

pub struct PollLoop {
    shared: Shared,
    refresh: Arc<Notify>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl PollLoop {
    /// Spawns the refresh task. Must be called from within a tokio runtime.
    pub fn start(api: Arc<dyn DashboardApi>, state: ViewState, interval: Duration) -> Result<Self> {
        if interval.is_zero() {
            return Err(Error::PollerError("Poll interval must be positive".to_string()));
        }
        let (completed, _) = watch::channel(0);
        let shared = Shared {
            state: Arc::new(RwLock::new(state)),
            closed: Arc::new(AtomicBool::new(false)),
            completed: Arc::new(completed),
        };
        let refresh = Arc::new(Notify::new());

        let task_shared = shared.clone();
        let task_refresh = refresh.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = task_refresh.notified() => {
                        debug!("Refresh requested out of schedule");
                    }
                }
                if task_shared.closed.load(Ordering::SeqCst) {
                    break;
                }
                run_cycle(api.as_ref(), &task_shared).await;
            }
        });

        info!("Poll loop started with interval {:?}", interval);
        Ok(Self {
            shared,
            refresh,
            interval,
            handle: Some(handle),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.shared.closed.load(Ordering::SeqCst)
    }

    /// Schedules one extra cycle without waiting for the next tick.
    pub fn refresh_now(&self) {
        self.refresh.notify_one();
    }

    /// Yields the count of completed cycles; `changed()` resolves once per
    /// cycle whose results are all applied.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.completed.subscribe()
    }

    /// A copy of the current view state.
    pub async fn view(&self) -> ViewState {
        self.shared.state.read().await.clone()
    }

    /// Applies a user action to the view. Returns `false` after teardown.
    pub async fn update<F>(&self, f: F) -> bool
    where
        F: FnOnce(&mut ViewState),
    {
        self.shared.apply(f).await
    }

    /// Tears the loop down and hands back the final view state.
    ///
    /// After this returns no in-flight fetch can mutate the state.
    pub async fn stop(mut self) -> ViewState {
        {
            let _guard = self.shared.state.write().await;
            self.shared.closed.store(true, Ordering::SeqCst);
        }
        if let Some(handle) = self.handle.take() {
            handle.abort();
            let _ = handle.await;
        }
        info!("Poll loop stopped");
        self.shared.state.read().await.clone()
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.shared.closed.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

/// One refresh: all fetches issued together, each applied as it resolves.
async fn run_cycle(api: &dyn DashboardApi, shared: &Shared) {
    metrics::POLL_CYCLES.inc();
    if !shared.apply(ViewState::begin_cycle).await {
        return;
    }

    let label = Local::now().format(LABEL_FORMAT).to_string();

    let market = fetch_and_apply(shared, Endpoint::Market, api.fetch_market(), |state, snapshot| {
        state.apply_market(snapshot, &label)
    });
    let balance = fetch_and_apply(shared, Endpoint::Balance, api.fetch_balance(), ViewState::apply_balance);
    let positions = fetch_and_apply(shared, Endpoint::Positions, api.fetch_positions(), ViewState::apply_positions);
    let history = fetch_and_apply(shared, Endpoint::History, api.fetch_history(), ViewState::apply_history);
    let performance = fetch_and_apply(
        shared,
        Endpoint::Performance,
        api.fetch_performance(),
        ViewState::apply_performance,
    );

    tokio::join!(market, balance, positions, history, performance);

    if !shared.closed.load(Ordering::SeqCst) {
        shared.completed.send_modify(|n| *n += 1);
    }
}

async fn fetch_and_apply<T, Fut, F>(shared: &Shared, endpoint: Endpoint, fetch: Fut, on_ok: F)
where
    Fut: Future<Output = Result<T>>,
    F: FnOnce(&mut ViewState, T),
{
    let result = fetch.await;
    shared.apply_result(endpoint, result, on_ok).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockDashboardApi;
    use crate::models::{Balance, Order, OrderResponse, Performance, Positions, Snapshot, Ticker, Trade};
    use async_trait::async_trait;
    use crate::view::ViewKind;
    use std::sync::atomic::AtomicUsize;

    fn btc(price: f64) -> Snapshot {
        let mut snapshot = Snapshot::new();
        snapshot.insert("BTC/USDT".to_string(), Ticker { price, change: 0.0, volume: 1.0 });
        snapshot
    }

    fn mock_api(market_calls: Arc<AtomicUsize>) -> MockDashboardApi {
        let mut api = MockDashboardApi::new();
        api.expect_fetch_market().returning(move || {
            let n = market_calls.fetch_add(1, Ordering::SeqCst);
            Ok(btc(45000.0 + n as f64))
        });
        api.expect_fetch_balance().returning(|| Ok(Balance::default()));
        api.expect_fetch_positions().returning(|| Ok(Positions::new()));
        api.expect_fetch_history().returning(|| Ok(Vec::new()));
        api.expect_fetch_performance().returning(|| Ok(Performance::default()));
        api
    }

    fn state() -> ViewState {
        ViewState::new(ViewKind::Trading, "BTC/USDT", 30)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_immediately_then_every_interval() {
        let calls = Arc::new(AtomicUsize::new(0));
        let api: Arc<dyn DashboardApi> = Arc::new(mock_api(calls.clone()));
        let poller = PollLoop::start(api, state(), Duration::from_millis(3_000)).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(3_000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        tokio::time::sleep(Duration::from_millis(6_000)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 4);

        let view = poller.stop().await;
        assert_eq!(view.buffer().len("BTC/USDT"), 4);
        assert_eq!(view.stats().cycles, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_the_timer() {
        let calls = Arc::new(AtomicUsize::new(0));
        let api: Arc<dyn DashboardApi> = Arc::new(mock_api(calls.clone()));
        let poller = PollLoop::start(api, state(), Duration::from_millis(3_000)).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let _ = poller.stop().await;
        let seen = calls.load(Ordering::SeqCst);

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(calls.load(Ordering::SeqCst), seen);
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_failures_are_logged_and_polling_continues() {
        let mut api = MockDashboardApi::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        api.expect_fetch_market().returning(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Err(Error::ApiConnectionFailed("offline".to_string()))
        });
        api.expect_fetch_balance()
            .returning(|| Ok(Balance { total: 1.0, available: 1.0, pnl: 0.0, currency: None }));
        api.expect_fetch_positions().returning(|| Ok(Positions::new()));
        api.expect_fetch_history().returning(|| Ok(Vec::new()));
        api.expect_fetch_performance().returning(|| Ok(Performance::default()));

        let poller = PollLoop::start(Arc::new(api), state(), Duration::from_millis(3_000)).unwrap();
        tokio::time::sleep(Duration::from_millis(6_010)).await;

        let view = poller.view().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(view.stats().failures, 3);
        assert!(view.snapshot().is_empty());
        assert_eq!(view.balance().total, 1.0);
        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_now_runs_an_extra_cycle() {
        let calls = Arc::new(AtomicUsize::new(0));
        let api: Arc<dyn DashboardApi> = Arc::new(mock_api(calls.clone()));
        let poller = PollLoop::start(api, state(), Duration::from_millis(3_000)).unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        poller.refresh_now();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        poller.stop().await;
    }

    #[tokio::test]
    async fn test_zero_interval_is_rejected() {
        let api: Arc<dyn DashboardApi> = Arc::new(MockDashboardApi::new());
        assert!(matches!(
            PollLoop::start(api, state(), Duration::ZERO),
            Err(Error::PollerError(_))
        ));
    }

    #[tokio::test]
    async fn test_update_after_close_is_refused() {
        let (completed, _) = watch::channel(0);
        let shared = Shared {
            state: Arc::new(RwLock::new(state())),
            closed: Arc::new(AtomicBool::new(true)),
            completed: Arc::new(completed),
        };
        let applied = shared.apply(|s| s.select_symbol("ETH/USDT")).await;
        assert!(!applied);
        assert_eq!(shared.state.read().await.selected_symbol(), "BTC/USDT");
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_completion_is_published_after_results_land() {
        let calls = Arc::new(AtomicUsize::new(0));
        let api: Arc<dyn DashboardApi> = Arc::new(mock_api(calls));
        let poller = PollLoop::start(api, state(), Duration::from_millis(3_000)).unwrap();
        let mut cycles = poller.subscribe();
        assert_eq!(*cycles.borrow(), 0);

        cycles.changed().await.unwrap();
        assert_eq!(*cycles.borrow_and_update(), 1);
        let view = poller.view().await;
        assert_eq!(view.snapshot()["BTC/USDT"].price, 45000.0);
        assert_eq!(view.chart().len(), 1);

        cycles.changed().await.unwrap();
        assert_eq!(*cycles.borrow_and_update(), 2);
        assert_eq!(poller.view().await.chart().values, vec![45000.0, 45001.0]);
        poller.stop().await;
    }

    /// Market data arrives only after `delay`; everything else is immediate.
    struct SlowMarket {
        delay: Duration,
    }

    #[async_trait]
    impl DashboardApi for SlowMarket {
        async fn fetch_market(&self) -> Result<Snapshot> {
            tokio::time::sleep(self.delay).await;
            Ok(btc(45000.0))
        }

        async fn fetch_balance(&self) -> Result<Balance> {
            Ok(Balance { total: 5.0, available: 5.0, pnl: 0.0, currency: None })
        }

        async fn fetch_positions(&self) -> Result<Positions> {
            Ok(Positions::new())
        }

        async fn fetch_history(&self) -> Result<Vec<Trade>> {
            Ok(Vec::new())
        }

        async fn fetch_performance(&self) -> Result<Performance> {
            Ok(Performance::default())
        }

        async fn submit_order(&self, _order: &Order) -> Result<OrderResponse> {
            Ok(OrderResponse::default())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_fetch_drops_the_late_result() {
        let api: Arc<dyn DashboardApi> = Arc::new(SlowMarket { delay: Duration::from_secs(5) });
        let poller = PollLoop::start(api, state(), Duration::from_millis(3_000)).unwrap();
        let cycles = poller.subscribe();

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(poller.view().await.balance().total, 5.0);

        let view = poller.stop().await;
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert!(view.snapshot().is_empty());
        assert_eq!(view.buffer().len("BTC/USDT"), 0);
        assert!(view.chart().is_empty());
        assert_eq!(view.stats().cycles, 1);
        assert_eq!(*cycles.borrow(), 0);
    }
}
