//! Per-symbol price series keyed by (market, time-frame, symbol).

use crate::domain::error::DevscanError;
use crate::domain::period::PricePeriod;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SeriesKey {
    pub market: String,
    pub timeframe: String,
    pub symbol: String,
}

impl SeriesKey {
    pub fn new(
        market: impl Into<String>,
        timeframe: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Self {
        Self {
            market: market.into(),
            timeframe: timeframe.into(),
            symbol: symbol.into(),
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.market, self.timeframe, self.symbol)
    }
}

/// Ordered bars for one key. Construction enforces strictly increasing time.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    key: SeriesKey,
    periods: Vec<PricePeriod>,
}

impl Series {
    pub fn new(key: SeriesKey, periods: Vec<PricePeriod>) -> Result<Self, DevscanError> {
        for (i, pair) in periods.windows(2).enumerate() {
            let (prev, next) = (&pair[0].time, &pair[1].time);
            if !prev.same_kind(next) {
                return Err(DevscanError::malformed(
                    &key,
                    format!("mixed time formats at index {}: {} then {}", i + 1, prev, next),
                ));
            }
            if next <= prev {
                return Err(DevscanError::malformed(
                    &key,
                    format!("time not increasing at index {}: {} then {}", i + 1, prev, next),
                ));
            }
        }
        Ok(Self { key, periods })
    }

    pub fn key(&self) -> &SeriesKey {
        &self.key
    }

    pub fn periods(&self) -> &[PricePeriod] {
        &self.periods
    }

    pub fn last(&self) -> Option<&PricePeriod> {
        self.periods.last()
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }
}
