use anyhow::Result;
use clap::Parser;
use log::{info, warn, LevelFilter};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use trading_dashboard::api::{DashboardApi, HttpDashboardClient, SimulatedSource};
use trading_dashboard::cli::{Cli, Command};
use trading_dashboard::config::Config;
use trading_dashboard::dashboard::Dashboard;
use trading_dashboard::engine::TradingEngine;
use trading_dashboard::orders::{self, OrderForm};
use trading_dashboard::web::WebServer;
use trading_dashboard::{logging, metrics, render};

const DEFAULT_CONFIG: &str = "config/config.toml";

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let mut config = Config::load_or_default(&config_path)
        .map_err(|e| anyhow::anyhow!("Configuration loading failed for {:?}: {}", config_path, e))?;
    config.apply_env_overrides();
    config.validate()?;

    init_logging(&config, cli.debug)?;
    metrics::init()?;
    info!("Configuration loaded from {:?}", config_path);

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Watch { view, symbol, simulated } => {
            let mut poller = config.poller.clone();
            if let Some(symbol) = symbol {
                poller.selected_symbol = symbol;
            }
            let api = build_api(&config, simulated)?;
            let dashboard = Dashboard::mount(api, view, &poller)?;

            let mut cycles = dashboard.cycle_updates();
            loop {
                tokio::select! {
                    changed = cycles.changed() => {
                        if changed.is_err() {
                            warn!("Poll loop ended unexpectedly");
                            break;
                        }
                        let state = dashboard.view().await;
                        println!("{}", render::render(&state, chrono::Local::now()));
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }

            let state = dashboard.unmount().await;
            info!("Stopped after {} poll cycles", state.stats().cycles);
            Ok(())
        }
        Command::Order { symbol, side, quantity, simulated } => {
            let api = build_api(&config, simulated)?;
            let form = OrderForm::new(&symbol, side, &quantity);
            let order = match form.parse() {
                Ok(order) => order,
                Err(e) => {
                    eprintln!("{}", orders::failure_message(&e));
                    return Err(e.into());
                }
            };
            match orders::submit_order(api.as_ref(), &order).await {
                Ok(_) => {
                    println!("{}", orders::success_message(&order));
                    Ok(())
                }
                Err(e) => {
                    eprintln!("{}", orders::failure_message(&e));
                    Err(e.into())
                }
            }
        }
    }
}

fn init_logging(config: &Config, debug: bool) -> Result<()> {
    let level = if debug { LevelFilter::Debug } else { logging::parse_level(&config.logging.level) };
    match &config.logging.file {
        Some(file) => logging::init_file(Path::new(file), level),
        None => {
            logging::init_stderr(level);
            Ok(())
        }
    }
}

fn build_api(config: &Config, simulated: bool) -> Result<Arc<dyn DashboardApi>> {
    if simulated {
        info!("Using simulated market data");
        return Ok(Arc::new(SimulatedSource::new(Duration::from_millis(
            config.simulation.order_delay_ms,
        ))));
    }
    let client = HttpDashboardClient::with_timeout(config.api.base_url.clone(), config.api.request_timeout())?;
    info!("Polling dashboard API at {}", client.base_url());
    Ok(Arc::new(client))
}

async fn serve(config: &Config) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid server address: {}", e))?;
    let engine = Arc::new(TradingEngine::new(config.server.initial_cash));
    let server = WebServer::new(engine, Duration::from_millis(config.server.tick_ms));

    server
        .run(addr, async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Failed to listen for shutdown signal: {}", e);
            }
        })
        .await?;
    info!("Server stopped");
    Ok(())
}
