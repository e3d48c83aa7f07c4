//! Symbol catalog assembled from ordered fragment files.
//!
//! Merge contract: fragments are folded left to right. Markets are keyed by
//! `market`, sectors by `code`, symbols by `code`. A later fragment replaces
//! the scalar fields of an existing entry; children are merged recursively.
//! Entries keep the position where they were first seen.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub segment: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorEntry {
    pub code: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub symbols: Vec<SymbolEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub market: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sectors: Vec<SectorEntry>,
}

/// Also the on-disk shape of one fragment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub markets: Vec<MarketEntry>,
}

/// Resolved location of a symbol in the catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymbolRef<'a> {
    pub market: &'a MarketEntry,
    pub sector: &'a SectorEntry,
    pub symbol: &'a SymbolEntry,
}

/// Display name for a listing segment code.
pub fn segment_name(code: &str) -> Option<&'static str> {
    match code {
        "p" => Some("TSE Prime"),
        "s" => Some("TSE Standard"),
        "g" => Some("TSE Growth"),
        _ => None,
    }
}

fn upsert<T, F>(items: &mut Vec<T>, incoming: T, same: impl Fn(&T, &T) -> bool, merge: F)
where
    F: FnOnce(&mut T, T),
{
    match items.iter_mut().find(|existing| same(existing, &incoming)) {
        Some(existing) => merge(existing, incoming),
        None => items.push(incoming),
    }
}

fn merge_sector(existing: &mut SectorEntry, incoming: SectorEntry) {
    existing.name = incoming.name;
    for symbol in incoming.symbols {
        upsert(
            &mut existing.symbols,
            symbol,
            |a, b| a.code == b.code,
            |old, new| *old = new,
        );
    }
}

fn merge_market(existing: &mut MarketEntry, incoming: MarketEntry) {
    existing.name = incoming.name;
    for sector in incoming.sectors {
        upsert(&mut existing.sectors, sector, |a, b| a.code == b.code, merge_sector);
    }
}

impl Catalog {
    /// Fold one fragment into this catalog.
    pub fn merge(&mut self, fragment: Catalog) {
        for market in fragment.markets {
            upsert(&mut self.markets, market, |a, b| a.market == b.market, merge_market);
        }
    }

    pub fn market(&self, market: &str) -> Option<&MarketEntry> {
        self.markets.iter().find(|m| m.market == market)
    }

    /// First occurrence of a symbol code across all markets.
    pub fn find_symbol(&self, code: &str) -> Option<SymbolRef<'_>> {
        self.markets.iter().find_map(|m| locate(m, code))
    }

    /// Sector containing `symbol` within `market`.
    pub fn sector_of(&self, market: &str, symbol: &str) -> Option<&SectorEntry> {
        self.market(market)
            .and_then(|m| locate(m, symbol))
            .map(|r| r.sector)
    }

    pub fn symbol_count(&self) -> usize {
        self.markets
            .iter()
            .flat_map(|m| &m.sectors)
            .map(|s| s.symbols.len())
            .sum()
    }
}

fn locate<'a>(market: &'a MarketEntry, code: &str) -> Option<SymbolRef<'a>> {
    market.sectors.iter().find_map(|sector| {
        sector
            .symbols
            .iter()
            .find(|s| s.code == code)
            .map(|symbol| SymbolRef {
                market,
                sector,
                symbol,
            })
    })
}

/// Reduce fragments, in order, into one catalog.
pub fn build_catalog<I>(fragments: I) -> Catalog
where
    I: IntoIterator<Item = Catalog>,
{
    fragments.into_iter().fold(Catalog::default(), |mut acc, f| {
        acc.merge(f);
        acc
    })
}
