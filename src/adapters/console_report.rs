//! Plain-text rendering for terminal output.

use crate::domain::catalog::{segment_name, Catalog};
use crate::domain::period::{format_deviation, PricePeriod};
use crate::domain::series::SeriesKey;
use crate::domain::signal::SignalEntry;
use crate::domain::simulator::{SimulationParams, SimulationResult, TradeEvent};
use std::fmt::Write;

/// P&L shown in whole units.
fn money(value: f64) -> String {
    format!("{value:.0}")
}

pub fn format_trade(trade: &TradeEvent) -> String {
    match trade {
        TradeEvent::Buy {
            time,
            price,
            quantity,
            deviation,
            held_after,
        } => format!(
            "BUY  {time}  {quantity} @ {price:.2}  dev {}  held {held_after}",
            format_deviation(*deviation)
        ),
        TradeEvent::Sell {
            time,
            price,
            quantity,
            pnl,
            deviation,
        } => format!(
            "SELL {time}  {quantity} @ {price:.2}  dev {}  pnl {}",
            format_deviation(*deviation),
            money(*pnl)
        ),
    }
}

pub fn format_simulation(
    key: &SeriesKey,
    params: &SimulationParams,
    result: &SimulationResult,
) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Simulation: {key} ===");
    let _ = writeln!(
        out,
        "Buy at dev{p} <= {}, sell at dev{p} >= {}, {} per buy",
        params.buy_threshold,
        params.sell_threshold,
        params.cash_per_buy,
        p = params.signal_period
    );
    let _ = writeln!(out, "Realized P&L:     {}", money(result.realized_pnl));
    let _ = writeln!(out, "Unrealized P&L:   {}", money(result.unrealized_pnl));
    let _ = writeln!(out, "Total P&L:        {}", money(result.total_pnl));
    let _ = writeln!(
        out,
        "Trades:           {} buys, {} sells ({} winning)",
        result.buy_count(),
        result.sell_count(),
        result.winning_sells()
    );
    if !result.holding.is_flat() {
        let _ = writeln!(
            out,
            "Open holding:     {} @ avg {:.2}",
            result.holding.quantity,
            result.holding.average_cost()
        );
    }
    if !result.trades.is_empty() {
        out.push('\n');
        for trade in &result.trades {
            let _ = writeln!(out, "  {}", format_trade(trade));
        }
    }
    out
}

/// One signal line, annotated with catalog name, segment and sector when
/// known. The signal's own market is searched first.
pub fn format_signal(entry: &SignalEntry, catalog: Option<&Catalog>) -> String {
    let mut line = format!(
        "{:<8} {:<4} {:<8} {}  close {:.2}  dev{} {}",
        entry.symbol,
        entry.market,
        entry.timeframe,
        entry.date,
        entry.close,
        entry.period,
        format_deviation(entry.deviation)
    );
    let found = catalog.and_then(|c| match c.sector_of(&entry.market, &entry.symbol) {
        Some(sector) => sector
            .symbols
            .iter()
            .find(|s| s.code == entry.symbol)
            .map(|symbol| (sector, symbol)),
        None => c.find_symbol(&entry.symbol).map(|r| (r.sector, r.symbol)),
    });
    if let Some((sector, symbol)) = found {
        let _ = write!(line, "  {}", symbol.name);
        if let Some(segment) = symbol.segment.as_deref().and_then(segment_name) {
            let _ = write!(line, " [{segment}]");
        }
        if !sector.name.is_empty() {
            let _ = write!(line, " / {}", sector.name);
        }
    }
    line
}

/// Last-bar summary: OHLCV plus each moving average and its deviation.
pub fn format_period(key: &SeriesKey, period: &PricePeriod, ma_periods: &[u32]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{key} @ {}", period.time);
    let _ = writeln!(
        out,
        "  O {:.2}  H {:.2}  L {:.2}  C {:.2}  V {}  ({})",
        period.open,
        period.high,
        period.low,
        period.close,
        period.volume,
        if period.is_up() { "up" } else { "down" }
    );
    for p in ma_periods {
        let ma = period
            .moving_average(*p)
            .value()
            .map(|v| format!("{v:.2}"))
            .unwrap_or_else(|| "-".to_string());
        let dev = period
            .deviation(*p)
            .value()
            .map(format_deviation)
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(out, "  MA({p}) {ma}  {dev}");
    }
    out
}
