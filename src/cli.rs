use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::models::Side;
use crate::view::ViewKind;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the demo trading backend and its JSON API
    Serve,
    /// Poll the dashboard API and print the selected view
    Watch {
        #[arg(long, default_value = "trading", value_parser = parse_view)]
        view: ViewKind,
        /// Symbol shown in the price chart
        #[arg(long)]
        symbol: Option<String>,
        /// Use locally generated data instead of the HTTP API
        #[arg(long)]
        simulated: bool,
    },
    /// Submit one market order
    Order {
        #[arg(long)]
        symbol: String,
        #[arg(long, value_parser = parse_side)]
        side: Side,
        /// Kept as text so the order form can reject it with its own message
        #[arg(long)]
        quantity: String,
        #[arg(long)]
        simulated: bool,
    },
}

fn parse_view(s: &str) -> Result<ViewKind, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}

fn parse_side(s: &str) -> Result<Side, String> {
    s.parse().map_err(|e: crate::error::Error| e.to_string())
}
