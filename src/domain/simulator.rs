//! Deviation-driven single-position trading simulator.
//!
//! `simulate` is a pure function of the series and parameters: each call
//! starts flat, so reruns with new parameters cannot inherit a holding.
//!
//! Rules per bar with a present deviation, in order:
//! 1. Buy: `dev <= buy_threshold` buys `floor(cash_per_buy / close)` shares
//! 2. Sell: while holding, `dev >= sell_threshold` liquidates the whole
//!    holding at `close` against its average cost
//!
//! Both rules are checked on the same bar, so overlapping thresholds can buy
//! and sell on one bar. See [`SimulationParams::thresholds_overlap`].
//! The sell check is deliberately not an `else` branch of the buy check.
//!
//! A buy that would overflow the held share count is skipped.

use crate::domain::period::PeriodTime;
use crate::domain::series::Series;
use crate::domain::signal::{DEFAULT_BUY_THRESHOLD, DEFAULT_SELL_THRESHOLD, DEFAULT_SIGNAL_PERIOD};
use serde::Serialize;

pub const DEFAULT_CASH_PER_BUY: f64 = 100_000.0;

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationParams {
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub cash_per_buy: f64,
    pub signal_period: u32,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            buy_threshold: DEFAULT_BUY_THRESHOLD,
            sell_threshold: DEFAULT_SELL_THRESHOLD,
            cash_per_buy: DEFAULT_CASH_PER_BUY,
            signal_period: DEFAULT_SIGNAL_PERIOD,
        }
    }
}

impl SimulationParams {
    /// Build from operator-typed text. Unparseable fields become NaN, which
    /// no comparison satisfies, so such a run produces no trades.
    pub fn from_operator_input(buy: &str, sell: &str, cash: &str, signal_period: u32) -> Self {
        SimulationParams {
            buy_threshold: parse_operator_number(buy),
            sell_threshold: parse_operator_number(sell),
            cash_per_buy: parse_operator_number(cash),
            signal_period,
        }
    }

    /// True when a single bar may trigger a buy and then a sell.
    pub fn thresholds_overlap(&self) -> bool {
        self.buy_threshold >= self.sell_threshold
    }

    /// Fields that parsed to NaN or infinity.
    pub fn invalid_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if !self.buy_threshold.is_finite() {
            fields.push("buy_threshold");
        }
        if !self.sell_threshold.is_finite() {
            fields.push("sell_threshold");
        }
        if !self.cash_per_buy.is_finite() {
            fields.push("cash_per_buy");
        }
        fields
    }
}

/// Lenient numeric parse; accepts a leading `+` and `1,000,000` style
/// thousands grouping. A comma anywhere else makes the input NaN.
pub fn parse_operator_number(input: &str) -> f64 {
    let trimmed = input.trim();
    if !trimmed.contains(',') {
        return trimmed.parse::<f64>().unwrap_or(f64::NAN);
    }
    let unsigned = trimmed.trim_start_matches(['+', '-']);
    let (integer, fraction) = unsigned.split_once('.').unwrap_or((unsigned, ""));
    if fraction.contains(',') || !is_grouped(integer) {
        return f64::NAN;
    }
    trimmed.replace(',', "").parse::<f64>().unwrap_or(f64::NAN)
}

/// `1,234` / `12,345,678`: a 1-3 digit lead, then groups of exactly three.
fn is_grouped(integer: &str) -> bool {
    let mut groups = integer.split(',');
    let lead_ok = groups
        .next()
        .is_some_and(|g| (1..=3).contains(&g.len()) && g.bytes().all(|b| b.is_ascii_digit()));
    lead_ok && groups.all(|g| g.len() == 3 && g.bytes().all(|b| b.is_ascii_digit()))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "side", rename_all = "UPPERCASE")]
pub enum TradeEvent {
    Buy {
        time: PeriodTime,
        price: f64,
        quantity: u64,
        deviation: f64,
        held_after: u64,
    },
    Sell {
        time: PeriodTime,
        price: f64,
        quantity: u64,
        pnl: f64,
        deviation: f64,
    },
}

impl TradeEvent {
    pub fn is_buy(&self) -> bool {
        matches!(self, TradeEvent::Buy { .. })
    }
}

/// Shares held and their summed cost basis.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Holding {
    pub quantity: u64,
    pub total_cost: f64,
}

impl Holding {
    pub fn is_flat(&self) -> bool {
        self.quantity == 0
    }

    pub fn average_cost(&self) -> f64 {
        if self.quantity == 0 {
            0.0
        } else {
            self.total_cost / self.quantity as f64
        }
    }

    /// Returns false, leaving the holding unchanged, if the share count
    /// would overflow.
    pub fn add(&mut self, quantity: u64, price: f64) -> bool {
        let Some(total) = self.quantity.checked_add(quantity) else {
            return false;
        };
        self.quantity = total;
        self.total_cost += quantity as f64 * price;
        true
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        if self.is_flat() {
            0.0
        } else {
            (price - self.average_cost()) * self.quantity as f64
        }
    }

    /// Close the whole holding at `price`; returns (quantity, pnl).
    pub fn liquidate(&mut self, price: f64) -> (u64, f64) {
        let quantity = self.quantity;
        let pnl = self.unrealized_pnl(price);
        *self = Holding::default();
        (quantity, pnl)
    }
}

/// Whole shares purchasable with `cash` at `price`; 0 when not computable.
pub fn buy_quantity(cash: f64, price: f64) -> u64 {
    let shares = (cash / price).floor();
    if shares.is_finite() && shares >= 1.0 {
        shares as u64
    } else {
        0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimulationResult {
    pub realized_pnl: f64,
    pub unrealized_pnl: f64,
    pub total_pnl: f64,
    pub trades: Vec<TradeEvent>,
    /// Holding left open at the end of the series.
    pub holding: Holding,
}

impl SimulationResult {
    pub fn buy_count(&self) -> usize {
        self.trades.iter().filter(|t| t.is_buy()).count()
    }

    pub fn sell_count(&self) -> usize {
        self.trades.len() - self.buy_count()
    }

    /// Sells that realized a positive P&L.
    pub fn winning_sells(&self) -> usize {
        self.trades
            .iter()
            .filter(|t| matches!(t, TradeEvent::Sell { pnl, .. } if *pnl > 0.0))
            .count()
    }
}

pub fn simulate(series: &Series, params: &SimulationParams) -> SimulationResult {
    let mut holding = Holding::default();
    let mut realized_pnl = 0.0;
    let mut trades = Vec::new();

    for period in series.periods() {
        let Some(dev) = period.deviation(params.signal_period).value() else {
            continue;
        };
        let price = period.close;

        if dev <= params.buy_threshold {
            let quantity = buy_quantity(params.cash_per_buy, price);
            if quantity > 0 && holding.add(quantity, price) {
                trades.push(TradeEvent::Buy {
                    time: period.time.clone(),
                    price,
                    quantity,
                    deviation: dev,
                    held_after: holding.quantity,
                });
            }
        }

        if !holding.is_flat() && dev >= params.sell_threshold {
            let (quantity, pnl) = holding.liquidate(price);
            realized_pnl += pnl;
            trades.push(TradeEvent::Sell {
                time: period.time.clone(),
                price,
                quantity,
                pnl,
                deviation: dev,
            });
        }
    }

    let unrealized_pnl = series
        .last()
        .map(|last| holding.unrealized_pnl(last.close))
        .unwrap_or(0.0);

    SimulationResult {
        realized_pnl,
        unrealized_pnl,
        total_pnl: realized_pnl + unrealized_pnl,
        trades,
        holding,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::period::{Metric, PricePeriod};
    use crate::domain::series::SeriesKey;
    use approx::assert_relative_eq;

    fn bar(time: &str, close: f64, dev36: Option<f64>) -> PricePeriod {
        let dev = dev36.map(Metric::Present).unwrap_or(Metric::Absent);
        PricePeriod::new(PeriodTime::Label(time.into()), close, close, close, close, 0)
            .with_average(36, Metric::Absent, dev)
    }

    fn make_series(bars: Vec<PricePeriod>) -> Series {
        Series::new(SeriesKey::new("jp", "monthly", "7203"), bars).unwrap()
    }

    fn params(buy: f64, sell: f64, cash: f64) -> SimulationParams {
        SimulationParams {
            buy_threshold: buy,
            sell_threshold: sell,
            cash_per_buy: cash,
            signal_period: 36,
        }
    }

    fn two_bar_series() -> Series {
        make_series(vec![
            bar("2024-01", 100.0, Some(-35.0)),
            bar("2024-02", 110.0, Some(10.0)),
        ])
    }

    #[test]
    fn holds_to_end_with_unrealized_gain() {
        let r = simulate(&two_bar_series(), &params(-30.0, 30.0, 1000.0));
        assert_eq!(r.trades.len(), 1);
        assert_eq!(
            r.trades[0],
            TradeEvent::Buy {
                time: PeriodTime::Label("2024-01".into()),
                price: 100.0,
                quantity: 10,
                deviation: -35.0,
                held_after: 10,
            }
        );
        assert_relative_eq!(r.realized_pnl, 0.0);
        assert_relative_eq!(r.unrealized_pnl, 100.0);
        assert_relative_eq!(r.total_pnl, 100.0);
        assert_eq!(r.holding.quantity, 10);
    }

    #[test]
    fn sells_on_lower_sell_threshold() {
        let r = simulate(&two_bar_series(), &params(-30.0, 5.0, 1000.0));
        assert_eq!(r.trades.len(), 2);
        match &r.trades[1] {
            TradeEvent::Sell { quantity, pnl, price, .. } => {
                assert_eq!(*quantity, 10);
                assert_relative_eq!(*price, 110.0);
                assert_relative_eq!(*pnl, 100.0);
            }
            other => panic!("expected sell, got {other:?}"),
        }
        assert_relative_eq!(r.realized_pnl, 100.0);
        assert_relative_eq!(r.unrealized_pnl, 0.0);
        assert!(r.holding.is_flat());
        assert_relative_eq!(r.holding.total_cost, 0.0);
    }

    #[test]
    fn cash_below_price_buys_nothing() {
        let s = make_series(vec![
            bar("2024-01", 100.0, Some(-35.0)),
            bar("2024-02", 100.0, Some(40.0)),
        ]);
        let r = simulate(&s, &params(-30.0, 30.0, 50.0));
        assert!(r.trades.is_empty());
        assert_relative_eq!(r.total_pnl, 0.0);
    }

    #[test]
    fn sell_signal_without_position_is_noop() {
        let s = make_series(vec![bar("2024-01", 100.0, Some(45.0))]);
        let r = simulate(&s, &params(-30.0, 30.0, 1000.0));
        assert!(r.trades.is_empty());
        assert_relative_eq!(r.realized_pnl, 0.0);
    }

    #[test]
    fn absent_deviation_skips_only_that_bar() {
        let s = make_series(vec![
            bar("2024-01", 100.0, None),
            bar("2024-02", 100.0, Some(-40.0)),
            bar("2024-03", 90.0, None),
            bar("2024-04", 120.0, Some(35.0)),
        ]);
        let r = simulate(&s, &params(-30.0, 30.0, 1000.0));
        assert_eq!(r.buy_count(), 1);
        assert_eq!(r.sell_count(), 1);
        assert_relative_eq!(r.realized_pnl, 200.0);
    }

    #[test]
    fn no_valid_bars_yields_zero() {
        let s = make_series(vec![bar("2024-01", 100.0, None), bar("2024-02", 50.0, None)]);
        let r = simulate(&s, &params(-30.0, 30.0, 1000.0));
        assert!(r.trades.is_empty());
        assert_relative_eq!(r.realized_pnl, 0.0);
        assert_relative_eq!(r.unrealized_pnl, 0.0);
    }

    #[test]
    fn empty_series_yields_zero() {
        let r = simulate(&make_series(vec![]), &SimulationParams::default());
        assert!(r.trades.is_empty());
        assert_relative_eq!(r.total_pnl, 0.0);
    }

    #[test]
    fn repeated_buys_average_cost() {
        let s = make_series(vec![
            bar("2024-01", 100.0, Some(-31.0)),
            bar("2024-02", 50.0, Some(-45.0)),
            bar("2024-03", 80.0, Some(30.0)),
        ]);
        let r = simulate(&s, &params(-30.0, 30.0, 1000.0));
        // 10 @ 100 + 20 @ 50 = 30 shares, cost 2000, avg 66.67
        match &r.trades[1] {
            TradeEvent::Buy { quantity, held_after, .. } => {
                assert_eq!(*quantity, 20);
                assert_eq!(*held_after, 30);
            }
            other => panic!("expected buy, got {other:?}"),
        }
        assert_relative_eq!(r.realized_pnl, 80.0 * 30.0 - 2000.0, epsilon = 1e-9);
    }

    #[test]
    fn unrealized_uses_last_close_even_without_deviation() {
        let s = make_series(vec![
            bar("2024-01", 100.0, Some(-35.0)),
            bar("2024-02", 90.0, None),
        ]);
        let r = simulate(&s, &params(-30.0, 30.0, 1000.0));
        assert_relative_eq!(r.unrealized_pnl, -100.0);
    }

    #[test]
    fn overlapping_thresholds_buy_then_sell_same_bar() {
        let s = make_series(vec![bar("2024-01", 100.0, Some(0.0))]);
        let p = params(10.0, -10.0, 1000.0);
        assert!(p.thresholds_overlap());
        let r = simulate(&s, &p);
        assert_eq!(r.buy_count(), 1);
        assert_eq!(r.sell_count(), 1);
        assert_relative_eq!(r.realized_pnl, 0.0);
        assert!(r.holding.is_flat());
    }

    #[test]
    fn invalid_operator_input_produces_no_trades() {
        let s = two_bar_series();
        let p = SimulationParams::from_operator_input("abc", "30", "1000", 36);
        assert_eq!(p.invalid_fields(), vec!["buy_threshold"]);
        assert!(simulate(&s, &p).trades.is_empty());

        let p = SimulationParams::from_operator_input("-30", "30", "", 36);
        assert_eq!(p.invalid_fields(), vec!["cash_per_buy"]);
        assert!(simulate(&s, &p).trades.is_empty());
    }

    #[test]
    fn operator_number_parsing() {
        assert_relative_eq!(parse_operator_number(" 100,000 "), 100_000.0);
        assert_relative_eq!(parse_operator_number("+30"), 30.0);
        assert_relative_eq!(parse_operator_number("-30.5"), -30.5);
        assert!(parse_operator_number("ten").is_nan());
    }

    #[test]
    fn operator_number_grouping_must_be_thousands() {
        assert_relative_eq!(parse_operator_number("1,000,000"), 1_000_000.0);
        assert_relative_eq!(parse_operator_number("-1,234.5"), -1234.5);
        assert!(parse_operator_number("-30,5").is_nan());
        assert!(parse_operator_number("1,00").is_nan());
        assert!(parse_operator_number("1000,000").is_nan());
        assert!(parse_operator_number(",100").is_nan());
        assert!(parse_operator_number("1.5,000").is_nan());
    }

    #[test]
    fn misplaced_comma_in_threshold_makes_no_trades() {
        let p = SimulationParams::from_operator_input("-30,5", "30", "1000", 36);
        assert_eq!(p.invalid_fields(), vec!["buy_threshold"]);
        assert!(simulate(&two_bar_series(), &p).trades.is_empty());
    }

    #[test]
    fn huge_cash_never_overflows_holding() {
        let s = make_series(vec![
            bar("2024-01", 1.0, Some(-40.0)),
            bar("2024-02", 1.0, Some(-40.0)),
            bar("2024-03", 1.0, Some(-40.0)),
        ]);
        let p = SimulationParams::from_operator_input("-30", "30", "1e19", 36);
        assert!(p.invalid_fields().is_empty());

        let r = simulate(&s, &p);

        assert_eq!(r.buy_count(), 1);
        assert_eq!(r.holding.quantity, buy_quantity(1e19, 1.0));
        assert!(r.unrealized_pnl.is_finite());
    }

    #[test]
    fn holding_add_rejects_overflow() {
        let mut h = Holding::default();
        assert!(h.add(u64::MAX - 1, 1.0));
        let before = h;
        assert!(!h.add(2, 1.0));
        assert_eq!(h, before);
    }

    #[test]
    fn buy_quantity_edge_cases() {
        assert_eq!(buy_quantity(1000.0, 100.0), 10);
        assert_eq!(buy_quantity(999.0, 100.0), 9);
        assert_eq!(buy_quantity(50.0, 100.0), 0);
        assert_eq!(buy_quantity(1000.0, 0.0), 0);
        assert_eq!(buy_quantity(1000.0, -5.0), 0);
        assert_eq!(buy_quantity(f64::NAN, 100.0), 0);
    }

    #[test]
    fn reruns_do_not_share_state() {
        let s = two_bar_series();
        let first = simulate(&s, &params(-30.0, 30.0, 1000.0));
        let second = simulate(&s, &params(-30.0, 30.0, 1000.0));
        assert_eq!(first, second);
        assert_eq!(second.holding.quantity, 10);
    }

    #[test]
    fn holding_liquidate_resets() {
        let mut h = Holding::default();
        assert!(h.add(10, 100.0));
        assert!(h.add(10, 120.0));
        assert_relative_eq!(h.average_cost(), 110.0);
        let (qty, pnl) = h.liquidate(130.0);
        assert_eq!(qty, 20);
        assert_relative_eq!(pnl, 400.0);
        assert_eq!(h, Holding::default());
    }

    #[test]
    fn winning_sells_counts_positive_pnl() {
        let s = make_series(vec![
            bar("2024-01", 100.0, Some(-35.0)),
            bar("2024-02", 120.0, Some(35.0)),
            bar("2024-03", 100.0, Some(-35.0)),
            bar("2024-04", 90.0, Some(35.0)),
        ]);
        let r = simulate(&s, &params(-30.0, 30.0, 1000.0));
        assert_eq!(r.sell_count(), 2);
        assert_eq!(r.winning_sells(), 1);
    }
}
