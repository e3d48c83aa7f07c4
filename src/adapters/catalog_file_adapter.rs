//! Loads catalog fragment files and merges them in the order given.

use crate::domain::catalog::{build_catalog, Catalog};
use crate::domain::error::DevscanError;
use std::fs;
use std::path::{Path, PathBuf};

pub fn load_fragment(path: &Path) -> Result<Catalog, DevscanError> {
    let file = path.display().to_string();
    let content = fs::read_to_string(path).map_err(|e| DevscanError::Catalog {
        file: file.clone(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| DevscanError::Catalog {
        file,
        reason: e.to_string(),
    })
}

/// Every fragment must load; the first failure is returned.
pub fn load_catalog(paths: &[PathBuf]) -> Result<Catalog, DevscanError> {
    let fragments = paths
        .iter()
        .map(|p| load_fragment(p))
        .collect::<Result<Vec<_>, _>>()?;
    let catalog = build_catalog(fragments);
    log::info!(
        "catalog: {} markets, {} symbols from {} fragments",
        catalog.markets.len(),
        catalog.symbol_count(),
        paths.len()
    );
    Ok(catalog)
}
