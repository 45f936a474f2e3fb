use crate::engine::{self, TradingEngine};
use crate::error::{Error, Result};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use log::info;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Demo exchange API: the paper engine, its price ticker and the HTTP routes.
pub struct WebServer {
    engine: Arc<TradingEngine>,
    tick_interval: Duration,
}

/// A server running in the background; dropping it does not stop it.
pub struct RunningServer {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    server: JoinHandle<()>,
    ticker: JoinHandle<()>,
}

impl RunningServer {
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.ticker.abort();
        let _ = (&mut self.server).await;
        info!("Web server on {} stopped", self.addr);
    }
}

impl WebServer {
    pub fn new(engine: Arc<TradingEngine>, tick_interval: Duration) -> Self {
        Self { engine, tick_interval }
    }

    /// Serves until `signal` resolves.
    pub async fn run<S>(&self, addr: SocketAddr, signal: S) -> Result<()>
    where
        S: Future<Output = ()> + Send + 'static,
    {
        let ticker = engine::spawn_ticker(self.engine.clone(), self.tick_interval);
        let (bound, server) = warp::serve(super::routes(self.engine.clone()))
            .try_bind_with_graceful_shutdown(addr, signal)
            .map_err(|e| Error::IoError(std::io::Error::new(std::io::ErrorKind::AddrInUse, e.to_string())))?;
        info!("Dashboard API available at http://{}", bound);
        server.await;
        ticker.abort();
        Ok(())
    }

    /// Binds `addr` (port 0 picks a free port) and serves in the background.
    pub fn spawn(&self, addr: SocketAddr) -> Result<RunningServer> {
        let (tx, rx) = oneshot::channel::<()>();
        let ticker = engine::spawn_ticker(self.engine.clone(), self.tick_interval);
        let (bound, server) = warp::serve(super::routes(self.engine.clone()))
            .try_bind_with_graceful_shutdown(addr, async {
                let _ = rx.await;
            })
            .map_err(|e| {
                ticker.abort();
                Error::IoError(std::io::Error::new(std::io::ErrorKind::AddrInUse, e.to_string()))
            })?;
        info!("Dashboard API listening on {}", bound);
        Ok(RunningServer {
            addr: bound,
            shutdown: Some(tx),
            server: tokio::spawn(server),
            ticker,
        })
    }
}
