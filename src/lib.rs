pub mod api;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod engine;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod orders;
pub mod poller;
pub mod render;
pub mod series;
pub mod view;
pub mod web;

pub use error::{Error, Result};
