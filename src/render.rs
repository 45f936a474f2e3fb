//! Plain-text projection of a view for terminal output.
//!
//! Rendering is a pure function of a [`ViewState`] and the clock; it never
//! mutates the state it is given.

use chrono::{DateTime, Local};
use std::fmt::Write;

use crate::models::ChartSeries;
use crate::view::{Tab, ViewKind, ViewState};

const SPARK: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// Fixed decimals with `,` thousands separators. Non-finite values print as 0.
pub fn format_number(value: f64, decimals: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    let formatted = format!("{:.*}", decimals, value.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, Some(frac_part)),
        None => (formatted.as_str(), None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    // "-0.00" reads badly; only show the sign for values that survive rounding.
    let negative = value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0');
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(&grouped);
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(frac);
    }
    out
}

pub fn format_currency(value: f64) -> String {
    format_number(value, 2)
}

pub fn format_quantity(value: f64) -> String {
    format_number(value, 4)
}

fn format_change(change: f64) -> String {
    let sign = if change >= 0.0 { "+" } else { "" };
    format!("{}{:.2}%", sign, change)
}

/// One block character per point, scaled between the series min and max.
pub fn sparkline(series: &ChartSeries) -> String {
    let (Some(min), Some(max)) = (series.min(), series.max()) else {
        return String::new();
    };
    let span = max - min;
    series
        .values
        .iter()
        .map(|v| {
            if span <= f64::EPSILON {
                SPARK[SPARK.len() / 2]
            } else {
                let idx = ((v - min) / span * (SPARK.len() - 1) as f64).round() as usize;
                SPARK[idx.min(SPARK.len() - 1)]
            }
        })
        .collect()
}

pub fn render(state: &ViewState, now: DateTime<Local>) -> String {
    let mut out = String::new();
    match state.kind() {
        ViewKind::Trading => {
            render_header(&mut out, state);
            render_tabs(&mut out, state.active_tab());
            match state.active_tab() {
                Tab::Trading => {
                    render_market(&mut out, state);
                    render_chart(&mut out, state.chart());
                }
                Tab::Portfolio => render_positions(&mut out, state),
                Tab::History => render_history(&mut out, state),
                Tab::Performance => render_performance(&mut out, state),
            }
        }
        ViewKind::Admin => {
            render_header(&mut out, state);
            render_market(&mut out, state);
            render_symbol_summary(&mut out, state);
            render_positions(&mut out, state);
            render_history(&mut out, state);
            render_performance(&mut out, state);
        }
        ViewKind::Mobile => render_mobile(&mut out, state, now),
    }
    render_footer(&mut out, state);
    out
}

fn render_header(out: &mut String, state: &ViewState) {
    let balance = state.balance();
    let _ = writeln!(
        out,
        "Total: ${}  Available: ${}  PnL: ${}",
        format_currency(balance.total),
        format_currency(balance.available),
        format_currency(balance.pnl)
    );
}

fn render_tabs(out: &mut String, active: Tab) {
    let tabs: Vec<String> = Tab::ALL
        .iter()
        .map(|tab| if *tab == active { format!("[{}]", tab) } else { tab.to_string() })
        .collect();
    let _ = writeln!(out, "{}", tabs.join(" | "));
}

fn render_market(out: &mut String, state: &ViewState) {
    let _ = writeln!(out, "{:<12} {:>14} {:>9} {:>16}", "Symbol", "Price", "Change", "Volume");
    for (symbol, ticker) in state.snapshot() {
        let marker = if symbol == state.selected_symbol() { "*" } else { " " };
        let _ = writeln!(
            out,
            "{}{:<11} {:>14} {:>9} {:>16}",
            marker,
            symbol,
            format_currency(ticker.price),
            format_change(ticker.change),
            format_number(ticker.volume, 0)
        );
    }
}

fn render_chart(out: &mut String, chart: &ChartSeries) {
    if chart.is_empty() {
        let _ = writeln!(out, "{}: no price data yet", chart.symbol);
        return;
    }
    let _ = writeln!(
        out,
        "{} ({} pts, {} .. {}): {}",
        chart.symbol,
        chart.len(),
        chart.labels.first().map(String::as_str).unwrap_or(""),
        chart.labels.last().map(String::as_str).unwrap_or(""),
        sparkline(chart)
    );
}

fn render_symbol_summary(out: &mut String, state: &ViewState) {
    let buffer = state.buffer();
    let _ = writeln!(out, "{:<12} {:>4} {:>14} {:>14} {:>14}", "Series", "Pts", "Last", "Low", "High");
    for symbol in buffer.symbols() {
        let series = buffer.to_chart_series(&symbol);
        let _ = writeln!(
            out,
            "{:<12} {:>4} {:>14} {:>14} {:>14}",
            symbol,
            series.len(),
            format_currency(series.last().map_or(0.0, |(_, v)| v)),
            format_currency(series.min().unwrap_or(0.0)),
            format_currency(series.max().unwrap_or(0.0))
        );
    }
}

fn render_positions(out: &mut String, state: &ViewState) {
    if state.positions().is_empty() {
        let _ = writeln!(out, "No open positions");
        return;
    }
    for (symbol, position) in state.positions() {
        let _ = writeln!(
            out,
            "{:<12} qty {:>12} @ {:>12} = ${}",
            symbol,
            format_quantity(position.quantity),
            format_currency(position.current_price),
            format_currency(position.value)
        );
    }
}

fn render_history(out: &mut String, state: &ViewState) {
    if state.history().is_empty() {
        let _ = writeln!(out, "No trades yet");
        return;
    }
    // Newest first.
    for trade in state.history().iter().rev() {
        let _ = writeln!(
            out,
            "#{:<4} {} {:<4} {:<10} {:>12} @ {:>12} = ${}",
            trade.id,
            trade.datetime,
            trade.side,
            trade.symbol,
            format_quantity(trade.quantity),
            format_currency(trade.price),
            format_currency(trade.total)
        );
    }
}

fn render_performance(out: &mut String, state: &ViewState) {
    let perf = state.performance();
    let _ = writeln!(
        out,
        "Trades: {}  Wins: {}  Win rate: {:.1}%  Volume: ${}",
        perf.total_trades,
        perf.winning_trades,
        perf.win_rate,
        format_currency(perf.total_volume)
    );
}

fn render_mobile(out: &mut String, state: &ViewState, now: DateTime<Local>) {
    let balance = state.balance();
    let invested = balance.total - balance.pnl;
    let pnl_pct = if invested.abs() > f64::EPSILON { balance.pnl / invested * 100.0 } else { 0.0 };
    let _ = writeln!(out, "{}", now.format("%H:%M"));
    let _ = writeln!(out, "Total assets  {} USDT", format_currency(balance.total));
    let _ = writeln!(out, "Today's PnL   {} ({})", format_currency(balance.pnl), format_change(pnl_pct));
    for (symbol, position) in state.positions() {
        let _ = writeln!(out, "  {:<10} {:>12} USDT", symbol, format_currency(position.value));
    }
}

fn render_footer(out: &mut String, state: &ViewState) {
    if let Some(notice) = state.notice() {
        let _ = writeln!(out, "> {}", notice);
    }
    let stats = state.stats();
    let _ = write!(out, "cycles: {}  failures: {}", stats.cycles, stats.failures);
    if let Some(err) = &stats.last_error {
        let _ = write!(out, "  last error: {}", err);
    }
    out.push('\n');
}
