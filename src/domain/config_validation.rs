//! Configuration validation.
//!
//! Validates config fields before a scan or simulation runs. Every key is
//! optional; only values that are present are checked.

use crate::domain::error::DevscanError;
use crate::domain::signal::DEFAULT_SIGNAL_PERIOD;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_MA_PERIODS: [u32; 3] = [12, 24, 36];

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), DevscanError> {
    ma_periods(config)?;
    Ok(())
}

pub fn validate_scan_config(config: &dyn ConfigPort) -> Result<(), DevscanError> {
    let buy = optional_number(config, "scan", "buy_threshold")?;
    let sell = optional_number(config, "scan", "sell_threshold")?;
    warn_on_overlap("scan", buy, sell);
    validate_signal_period(config)?;
    validate_timeframes(config)?;
    Ok(())
}

/// The simulator reads `[scan] signal_period` too, so it is checked here.
pub fn validate_simulation_config(config: &dyn ConfigPort) -> Result<(), DevscanError> {
    validate_signal_period(config)?;
    let buy = optional_number(config, "simulate", "buy_threshold")?;
    let sell = optional_number(config, "simulate", "sell_threshold")?;
    warn_on_overlap("simulate", buy, sell);
    if let Some(cash) = optional_number(config, "simulate", "cash_per_buy")? {
        if cash <= 0.0 {
            return Err(DevscanError::ConfigInvalid {
                section: "simulate".to_string(),
                key: "cash_per_buy".to_string(),
                reason: "cash_per_buy must be positive".to_string(),
            });
        }
    }
    Ok(())
}

/// Configured moving-average periods, defaulting to 12, 24, 36.
pub fn ma_periods(config: &dyn ConfigPort) -> Result<Vec<u32>, DevscanError> {
    let Some(items) = config.get_list("data", "ma_periods") else {
        return Ok(DEFAULT_MA_PERIODS.to_vec());
    };
    if items.is_empty() {
        return Err(DevscanError::ConfigInvalid {
            section: "data".to_string(),
            key: "ma_periods".to_string(),
            reason: "at least one period is required".to_string(),
        });
    }
    items
        .iter()
        .map(|item| match item.parse::<u32>() {
            Ok(p) if p > 0 => Ok(p),
            _ => Err(DevscanError::ConfigInvalid {
                section: "data".to_string(),
                key: "ma_periods".to_string(),
                reason: format!("{item:?} is not a positive integer"),
            }),
        })
        .collect()
}

/// Numeric value if the key is set; an error if it is set but not a number.
pub fn optional_number(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<f64>, DevscanError> {
    match config.get_string(section, key) {
        None => Ok(None),
        Some(raw) => match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            _ => Err(DevscanError::ConfigInvalid {
                section: section.to_string(),
                key: key.to_string(),
                reason: format!("{raw:?} is not a number"),
            }),
        },
    }
}

fn warn_on_overlap(section: &str, buy: Option<f64>, sell: Option<f64>) {
    if let (Some(buy), Some(sell)) = (buy, sell) {
        if buy >= sell {
            log::warn!(
                "[{section}] buy_threshold {buy} >= sell_threshold {sell}: one bar can trigger both rules"
            );
        }
    }
}

fn validate_signal_period(config: &dyn ConfigPort) -> Result<(), DevscanError> {
    let period = match config.get_string("scan", "signal_period") {
        None => DEFAULT_SIGNAL_PERIOD,
        Some(raw) => match raw.trim().parse::<u32>() {
            Ok(p) if p > 0 => p,
            _ => {
                return Err(DevscanError::ConfigInvalid {
                    section: "scan".to_string(),
                    key: "signal_period".to_string(),
                    reason: format!("{raw:?} is not a positive integer"),
                });
            }
        },
    };
    let periods = ma_periods(config)?;
    if !periods.contains(&period) {
        return Err(DevscanError::ConfigInvalid {
            section: "scan".to_string(),
            key: "signal_period".to_string(),
            reason: format!("signal_period {period} is not one of ma_periods {periods:?}"),
        });
    }
    Ok(())
}

fn validate_timeframes(config: &dyn ConfigPort) -> Result<(), DevscanError> {
    match config.get_list("scan", "timeframes") {
        Some(list) if list.is_empty() => Err(DevscanError::ConfigInvalid {
            section: "scan".to_string(),
            key: "timeframes".to_string(),
            reason: "at least one timeframe is required".to_string(),
        }),
        _ => Ok(()),
    }
}
