//! Core domain types and logic.

pub mod period;
pub mod series;
pub mod signal;
pub mod simulator;
pub mod catalog;
pub mod config_validation;
pub mod error;
