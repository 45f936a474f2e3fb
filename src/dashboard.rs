use std::sync::Arc;
use log::info;
use tokio::sync::watch;

use crate::api::DashboardApi;
use crate::config::PollerConfig;
use crate::error::Result;
use crate::models::OrderResponse;
use crate::orders::{self, OrderForm};
use crate::poller::PollLoop;
use crate::view::{Tab, ViewKind, ViewState};

/// One mounted dashboard view: its data source, its poll loop and its state.
pub struct Dashboard {
    api: Arc<dyn DashboardApi>,
    poller: PollLoop,
}

impl Dashboard {
    /// Mounts the view and starts polling right away.
    pub fn mount(api: Arc<dyn DashboardApi>, kind: ViewKind, config: &PollerConfig) -> Result<Self> {
        let state = ViewState::new(kind, &config.selected_symbol, config.capacity);
        let poller = PollLoop::start(api.clone(), state, config.interval())?;
        info!("Mounted {:?} view", kind);
        Ok(Self { api, poller })
    }

    /// Changes once per completed poll cycle.
    pub fn cycle_updates(&self) -> watch::Receiver<u64> {
        self.poller.subscribe()
    }

    pub async fn view(&self) -> ViewState {
        self.poller.view().await
    }

    pub async fn select_symbol(&self, symbol: &str) {
        self.poller.update(|state| state.select_symbol(symbol)).await;
    }

    pub async fn select_tab(&self, tab: Tab) {
        self.poller.update(|state| state.select_tab(tab)).await;
    }

    pub async fn dismiss_notice(&self) {
        self.poller.update(ViewState::clear_notice).await;
    }

    /// Validates and submits one order, leaving the outcome as the view notice.
    /// A filled order triggers an immediate refresh.
    pub async fn place_order(&self, form: &OrderForm) -> Result<OrderResponse> {
        let outcome = match form.parse() {
            Ok(order) => orders::submit_order(self.api.as_ref(), &order)
                .await
                .map(|response| (order, response)),
            Err(e) => Err(e),
        };

        match outcome {
            Ok((order, response)) => {
                let message = orders::success_message(&order);
                self.poller.update(|state| state.set_notice(message)).await;
                self.poller.refresh_now();
                Ok(response)
            }
            Err(e) => {
                let message = orders::failure_message(&e);
                self.poller.update(|state| state.set_notice(message)).await;
                Err(e)
            }
        }
    }

    /// Tears the view down; no late fetch result reaches the returned state.
    pub async fn unmount(self) -> ViewState {
        self.poller.stop().await
    }
}
