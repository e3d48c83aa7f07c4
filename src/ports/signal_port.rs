//! Persistence port for scan results.

use crate::domain::error::DevscanError;
use crate::domain::signal::SignalLists;

pub trait SignalPort {
    fn write_signals(&self, signals: &SignalLists) -> Result<(), DevscanError>;

    fn read_signals(&self) -> Result<SignalLists, DevscanError>;
}
