//! Deviation signal scanner.
//!
//! Classifies the latest bar of every series into buy and sell candidates.
//! Only the last bar is inspected: the scan answers "which symbols sit at an
//! extreme deviation right now", it does not detect historical crossings.

use crate::domain::error::DevscanError;
use crate::domain::period::PeriodTime;
use crate::domain::series::{Series, SeriesKey};
use crate::ports::series_port::SeriesPort;
use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;

pub const DEFAULT_BUY_THRESHOLD: f64 = -30.0;
pub const DEFAULT_SELL_THRESHOLD: f64 = 30.0;
pub const DEFAULT_SIGNAL_PERIOD: u32 = 36;
pub const DEFAULT_TIMEFRAME: &str = "monthly";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// Fires when deviation <= buy.
    pub buy: f64,
    /// Fires when deviation >= sell.
    pub sell: f64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Thresholds {
            buy: DEFAULT_BUY_THRESHOLD,
            sell: DEFAULT_SELL_THRESHOLD,
        }
    }
}

impl Thresholds {
    /// True when one deviation value can satisfy both rules.
    pub fn overlap(&self) -> bool {
        self.buy >= self.sell
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub thresholds: Thresholds,
    pub signal_period: u32,
    pub timeframes: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            thresholds: Thresholds::default(),
            signal_period: DEFAULT_SIGNAL_PERIOD,
            timeframes: vec![DEFAULT_TIMEFRAME.to_string()],
        }
    }
}

/// One classified series. Serialized with the deviation under `dev{period}`.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalEntry {
    pub symbol: String,
    pub market: String,
    pub timeframe: String,
    pub date: PeriodTime,
    pub close: f64,
    pub deviation: f64,
    pub period: u32,
}

impl Serialize for SignalEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(6))?;
        map.serialize_entry("symbol", &self.symbol)?;
        map.serialize_entry("market", &self.market)?;
        map.serialize_entry("timeframe", &self.timeframe)?;
        map.serialize_entry("date", &self.date)?;
        map.serialize_entry("close", &self.close)?;
        map.serialize_entry(&format!("dev{}", self.period), &self.deviation)?;
        map.end()
    }
}

#[derive(Deserialize)]
struct RawSignalEntry {
    symbol: String,
    market: String,
    timeframe: String,
    date: PeriodTime,
    close: f64,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

impl<'de> Deserialize<'de> for SignalEntry {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawSignalEntry::deserialize(deserializer)?;
        let (period, deviation) = raw
            .extra
            .iter()
            .find_map(|(k, v)| {
                let period = k.strip_prefix("dev")?.parse::<u32>().ok()?;
                Some((period, v.as_f64()?))
            })
            .ok_or_else(|| D::Error::custom("signal entry has no numeric dev{p} field"))?;
        Ok(SignalEntry {
            symbol: raw.symbol,
            market: raw.market,
            timeframe: raw.timeframe,
            date: raw.date,
            close: raw.close,
            deviation,
            period,
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalLists {
    pub buy: Vec<SignalEntry>,
    pub sell: Vec<SignalEntry>,
}

impl SignalLists {
    /// Buy ascending (most oversold first), sell descending. Stable for ties.
    pub fn rank(&mut self) {
        self.buy.sort_by(|a, b| a.deviation.total_cmp(&b.deviation));
        self.sell.sort_by(|a, b| b.deviation.total_cmp(&a.deviation));
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedSeries {
    pub key: SeriesKey,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanReport {
    pub signals: SignalLists,
    pub scanned: usize,
    pub skipped: Vec<SkippedSeries>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    NoData,
    NoDeviation,
    Signal {
        entry: SignalEntry,
        buy: bool,
        sell: bool,
    },
}

/// Classify a series by its last bar.
pub fn classify(series: &Series, thresholds: &Thresholds, period: u32) -> Classification {
    let Some(last) = series.last() else {
        return Classification::NoData;
    };
    let Some(deviation) = last.deviation(period).value() else {
        return Classification::NoDeviation;
    };

    let key = series.key();
    Classification::Signal {
        entry: SignalEntry {
            symbol: key.symbol.clone(),
            market: key.market.clone(),
            timeframe: key.timeframe.clone(),
            date: last.time.clone(),
            close: last.close,
            deviation,
            period,
        },
        buy: deviation <= thresholds.buy,
        sell: deviation >= thresholds.sell,
    }
}

/// Scan already-loaded series. Load failures are logged and recorded as
/// skipped; they never abort the scan.
pub fn scan<I>(sources: I, config: &ScanConfig) -> ScanReport
where
    I: IntoIterator<Item = (SeriesKey, Result<Series, DevscanError>)>,
{
    let mut report = ScanReport::default();

    for (key, loaded) in sources {
        let series = match loaded {
            Ok(s) => s,
            Err(e) => {
                log::warn!("skip: {key} ({e})");
                report.skipped.push(SkippedSeries {
                    key,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        report.scanned += 1;

        match classify(&series, &config.thresholds, config.signal_period) {
            Classification::NoData => log::debug!("{key}: empty series"),
            Classification::NoDeviation => {
                log::debug!("{key}: no dev{} on last bar", config.signal_period)
            }
            Classification::Signal { entry, buy, sell } => match (buy, sell) {
                (true, true) => {
                    report.signals.buy.push(entry.clone());
                    report.signals.sell.push(entry);
                }
                (true, false) => report.signals.buy.push(entry),
                (false, true) => report.signals.sell.push(entry),
                (false, false) => {}
            },
        }
    }

    report.signals.rank();
    report
}

/// Keys for every configured time-frame, each series loaded only when the
/// iterator reaches it.
///
/// Only a failure to enumerate markets is fatal; a market or time-frame
/// directory that cannot be listed is logged and skipped like a bad series.
pub fn store_sources<'a>(
    port: &'a dyn SeriesPort,
    config: &ScanConfig,
) -> Result<impl Iterator<Item = (SeriesKey, Result<Series, DevscanError>)> + 'a, DevscanError> {
    let markets = port.list_markets()?;
    let mut keys = Vec::new();

    for timeframe in &config.timeframes {
        for market in &markets {
            match port.list_series(market, timeframe) {
                Ok(found) => {
                    log::info!("{market}/{timeframe}: {} series", found.len());
                    keys.extend(found);
                }
                Err(e) => log::warn!("skip: {market}/{timeframe} ({e})"),
            }
        }
    }

    Ok(keys.into_iter().map(move |key| {
        let loaded = port.load_series(&key);
        (key, loaded)
    }))
}

/// Scan every series in the store for the configured time-frames. Each
/// series is dropped once classified.
pub fn scan_store(port: &dyn SeriesPort, config: &ScanConfig) -> Result<ScanReport, DevscanError> {
    Ok(scan(store_sources(port, config)?, config))
}
