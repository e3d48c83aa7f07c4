//! Concrete adapter implementations for ports.

pub mod catalog_file_adapter;
pub mod console_report;
pub mod file_config_adapter;
pub mod json_series_adapter;
pub mod json_signal_adapter;
pub mod trade_log_csv;
