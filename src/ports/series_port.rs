//! Series store port trait.

use crate::domain::error::DevscanError;
use crate::domain::series::{Series, SeriesKey};

pub trait SeriesPort {
    fn list_markets(&self) -> Result<Vec<String>, DevscanError>;

    /// Keys of every series stored for `market` / `timeframe`, sorted.
    fn list_series(&self, market: &str, timeframe: &str) -> Result<Vec<SeriesKey>, DevscanError>;

    /// Load one series. `DevscanError::SeriesNotFound` when absent.
    fn load_series(&self, key: &SeriesKey) -> Result<Series, DevscanError>;
}
