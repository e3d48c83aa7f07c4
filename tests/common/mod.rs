#![allow(dead_code)]

use devscan::domain::error::DevscanError;
use devscan::domain::period::{Metric, PeriodTime, PricePeriod};
use devscan::domain::series::{Series, SeriesKey};
use devscan::ports::series_port::SeriesPort;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// In-memory series store. Keys in `errors` fail to load with that reason.
pub struct MockSeriesPort {
    pub data: BTreeMap<SeriesKey, Vec<PricePeriod>>,
    pub errors: BTreeMap<SeriesKey, String>,
}

impl MockSeriesPort {
    pub fn new() -> Self {
        Self {
            data: BTreeMap::new(),
            errors: BTreeMap::new(),
        }
    }

    pub fn with_bars(mut self, key: SeriesKey, bars: Vec<PricePeriod>) -> Self {
        self.data.insert(key, bars);
        self
    }

    pub fn with_error(mut self, key: SeriesKey, reason: &str) -> Self {
        self.errors.insert(key, reason.to_string());
        self
    }

    fn all_keys(&self) -> BTreeSet<&SeriesKey> {
        self.data.keys().chain(self.errors.keys()).collect()
    }
}

impl SeriesPort for MockSeriesPort {
    fn list_markets(&self) -> Result<Vec<String>, DevscanError> {
        let markets: BTreeSet<String> = self.all_keys().iter().map(|k| k.market.clone()).collect();
        Ok(markets.into_iter().collect())
    }

    fn list_series(&self, market: &str, timeframe: &str) -> Result<Vec<SeriesKey>, DevscanError> {
        Ok(self
            .all_keys()
            .into_iter()
            .filter(|k| k.market == market && k.timeframe == timeframe)
            .cloned()
            .collect())
    }

    fn load_series(&self, key: &SeriesKey) -> Result<Series, DevscanError> {
        if let Some(reason) = self.errors.get(key) {
            return Err(DevscanError::malformed(key, reason.clone()));
        }
        match self.data.get(key) {
            Some(bars) => Series::new(key.clone(), bars.clone()),
            None => Err(DevscanError::SeriesNotFound { key: key.clone() }),
        }
    }
}

pub fn key(symbol: &str) -> SeriesKey {
    SeriesKey::new("jp", "monthly", symbol)
}

/// Flat bar at `close` with an optional `dev36`.
pub fn bar(time: &str, close: f64, dev36: Option<f64>) -> PricePeriod {
    let dev = dev36.map(Metric::Present).unwrap_or(Metric::Absent);
    PricePeriod::new(PeriodTime::Label(time.to_string()), close, close, close, close, 1000)
        .with_average(36, Metric::Absent, dev)
}

/// Monthly labels `2020-01`, `2020-02`, ... paired with `(close, dev36)`.
pub fn monthly_bars(points: &[(f64, Option<f64>)]) -> Vec<PricePeriod> {
    points
        .iter()
        .enumerate()
        .map(|(i, (close, dev))| {
            let label = format!("{}-{:02}", 2020 + i / 12, i % 12 + 1);
            bar(&label, *close, *dev)
        })
        .collect()
}

pub fn make_series(symbol: &str, points: &[(f64, Option<f64>)]) -> Series {
    Series::new(key(symbol), monthly_bars(points)).unwrap()
}

/// Write a series file under `<root>/<market>/<timeframe>/<symbol>.json`.
pub fn write_series_file(root: &Path, market: &str, timeframe: &str, symbol: &str, json: &str) {
    let dir = root.join(market).join(timeframe);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{symbol}.json")), json).unwrap();
}

/// One-bar JSON series with the given close and `dev36`.
pub fn one_bar_json(close: f64, dev36: &str) -> String {
    format!(
        r#"[{{"time":"2024-01-31","open":{close},"high":{close},"low":{close},"close":{close},"volume":100,"ma36":{close},"dev36":{dev36}}}]"#
    )
}
