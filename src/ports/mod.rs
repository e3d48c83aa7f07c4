//! Port traits (hexagonal architecture boundaries).

pub mod config_port;
pub mod series_port;
pub mod signal_port;
