//! JSON directory-tree series store.
//!
//! Layout: `<root>/<market>/<timeframe>/<symbol>.json`, each file a JSON
//! array of bars in time order.

use crate::domain::error::DevscanError;
use crate::domain::period::PricePeriod;
use crate::domain::series::{Series, SeriesKey};
use crate::ports::series_port::SeriesPort;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const EXTENSION: &str = "json";

pub struct JsonSeriesStore {
    root: PathBuf,
}

impl JsonSeriesStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn series_path(&self, key: &SeriesKey) -> PathBuf {
        self.root
            .join(&key.market)
            .join(&key.timeframe)
            .join(format!("{}.{}", key.symbol, EXTENSION))
    }

    /// Parse file content for `key`. Any decode or ordering failure is
    /// reported as `SeriesMalformed`.
    pub fn parse_series(key: &SeriesKey, content: &str) -> Result<Series, DevscanError> {
        let periods: Vec<PricePeriod> =
            serde_json::from_str(content).map_err(|e| DevscanError::malformed(key, e.to_string()))?;
        Series::new(key.clone(), periods)
    }
}

fn is_plain_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\'])
}

fn with_path(e: io::Error, path: &Path) -> DevscanError {
    DevscanError::Io(io::Error::new(e.kind(), format!("{}: {}", path.display(), e)))
}

impl SeriesPort for JsonSeriesStore {
    fn list_markets(&self) -> Result<Vec<String>, DevscanError> {
        let entries = fs::read_dir(&self.root).map_err(|e| with_path(e, &self.root))?;

        let mut markets = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| with_path(e, &self.root))?;
            if !entry.path().is_dir() {
                continue;
            }
            match entry.file_name().into_string() {
                Ok(name) => markets.push(name),
                Err(name) => log::warn!("skip: non-UTF-8 market directory {name:?}"),
            }
        }

        markets.sort();
        Ok(markets)
    }

    fn list_series(&self, market: &str, timeframe: &str) -> Result<Vec<SeriesKey>, DevscanError> {
        let dir = self.root.join(market).join(timeframe);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        for entry in fs::read_dir(&dir).map_err(|e| with_path(e, &dir))? {
            let path = entry.map_err(|e| with_path(e, &dir))?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            match path.file_stem().and_then(|s| s.to_str()) {
                Some(symbol) => keys.push(SeriesKey::new(market, timeframe, symbol)),
                None => log::warn!("skip: non-UTF-8 file name {}", path.display()),
            }
        }

        keys.sort();
        Ok(keys)
    }

    fn load_series(&self, key: &SeriesKey) -> Result<Series, DevscanError> {
        let plain = [&key.market, &key.timeframe, &key.symbol]
            .iter()
            .all(|c| is_plain_component(c));
        let path = self.series_path(key);
        if !plain || !path.is_file() {
            return Err(DevscanError::SeriesNotFound { key: key.clone() });
        }

        let content = fs::read_to_string(&path)
            .map_err(|e| DevscanError::malformed(key, format!("failed to read {}: {}", path.display(), e)))?;
        Self::parse_series(key, &content)
    }
}
