//! Scan result files: `buySignals.json` and `sellSignals.json`.

use crate::domain::error::DevscanError;
use crate::domain::signal::{SignalEntry, SignalLists};
use crate::ports::signal_port::SignalPort;
use std::fs;
use std::path::{Path, PathBuf};

pub const BUY_FILE: &str = "buySignals.json";
pub const SELL_FILE: &str = "sellSignals.json";

pub struct SignalFileStore {
    dir: PathBuf,
}

impl SignalFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn buy_path(&self) -> PathBuf {
        self.dir.join(BUY_FILE)
    }

    pub fn sell_path(&self) -> PathBuf {
        self.dir.join(SELL_FILE)
    }

    fn staging_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn read_list(path: &Path) -> Result<Vec<SignalEntry>, DevscanError> {
        let file = path.display().to_string();
        let content = fs::read_to_string(path).map_err(|e| DevscanError::SignalFile {
            file: file.clone(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| DevscanError::SignalFile {
            file,
            reason: e.to_string(),
        })
    }
}

impl SignalPort for SignalFileStore {
    /// Both lists are serialized and staged before either file is replaced,
    /// so a failed write leaves the previous pair intact.
    fn write_signals(&self, signals: &SignalLists) -> Result<(), DevscanError> {
        let buy_json = serde_json::to_string_pretty(&signals.buy)?;
        let sell_json = serde_json::to_string_pretty(&signals.sell)?;
        fs::create_dir_all(&self.dir)?;

        let staged = [
            (Self::staging_path(&self.buy_path()), self.buy_path(), buy_json),
            (Self::staging_path(&self.sell_path()), self.sell_path(), sell_json),
        ];
        for (i, (tmp, _, json)) in staged.iter().enumerate() {
            if let Err(e) = fs::write(tmp, json) {
                for (written, _, _) in &staged[..i] {
                    let _ = fs::remove_file(written);
                }
                return Err(e.into());
            }
        }
        for (tmp, dest, _) in &staged {
            fs::rename(tmp, dest)?;
        }
        Ok(())
    }

    fn read_signals(&self) -> Result<SignalLists, DevscanError> {
        Ok(SignalLists {
            buy: Self::read_list(&self.buy_path())?,
            sell: Self::read_list(&self.sell_path())?,
        })
    }
}
