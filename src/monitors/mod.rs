//! Monitor runtime
//!
//! Per-row runtime state and sweep logic for the application monitoring
//! table and the event monitoring table. Table definitions live in
//! [`crate::tables`]; everything here is the mutable side that changes per
//! tick.

use core::fmt;

pub mod apps;
pub mod events;

pub use apps::{AppMonitor, AppMonitorState};
pub use events::{EventMonitor, EventRowState};

/// Monitor entry-point error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorError {
    /// Slot index beyond the loaded table
    InvalidSlot,
}

impl fmt::Display for MonitorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorError::InvalidSlot => write!(f, "monitor slot out of range"),
        }
    }
}
