//! Domain error types.

use crate::domain::series::SeriesKey;

/// Top-level error type for devscan.
#[derive(Debug, thiserror::Error)]
pub enum DevscanError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("series not found: {key}")]
    SeriesNotFound { key: SeriesKey },

    #[error("malformed series {key}: {reason}")]
    SeriesMalformed { key: SeriesKey, reason: String },

    #[error("catalog error in {file}: {reason}")]
    Catalog { file: String, reason: String },

    #[error("signal file error in {file}: {reason}")]
    SignalFile { file: String, reason: String },

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl DevscanError {
    pub fn malformed(key: &SeriesKey, reason: impl Into<String>) -> Self {
        DevscanError::SeriesMalformed {
            key: key.clone(),
            reason: reason.into(),
        }
    }
}

impl From<&DevscanError> for std::process::ExitCode {
    fn from(err: &DevscanError) -> Self {
        let code: u8 = match err {
            DevscanError::Io(_) => 1,
            DevscanError::ConfigParse { .. } | DevscanError::ConfigInvalid { .. } => 2,
            DevscanError::SeriesNotFound { .. } => 3,
            DevscanError::SeriesMalformed { .. }
            | DevscanError::Catalog { .. }
            | DevscanError::SignalFile { .. } => 4,
            DevscanError::Json(_) | DevscanError::Csv(_) => 5,
        };
        std::process::ExitCode::from(code)
    }
}
