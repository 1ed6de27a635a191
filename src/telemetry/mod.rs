//! Housekeeping telemetry snapshot
//!
//! Built on demand by the engine for the housekeeping-report collaborator,
//! which polls on its own cadence. Everything is copied out so the snapshot
//! has no ties back into engine state.

use heapless::Vec;

use crate::core::engine::MonitorFlags;
use crate::monitors::{AppMonitorState, EventRowState};
use crate::tables::{MAX_MONITORED_APPS, MAX_WATCHED_EVENTS};

/// One housekeeping snapshot
#[derive(Debug, Clone)]
pub struct HousekeepingPacket {
    /// Accepted ground commands
    pub cmd_count: u8,
    /// Rejected ground commands (unknown code, bad length, bad argument)
    pub cmd_err_count: u8,
    /// Active monitoring gates
    pub monitor_flags: MonitorFlags,
    /// Processor resets performed since the counter was cleared
    pub resets_performed: u16,
    /// Configured processor-reset allowance
    pub max_resets: u16,
    /// Inbound event records matched against the event table
    pub events_processed: u32,
    /// Liveness signals naming a slot outside the table
    pub invalid_signal_count: u32,
    /// Message actions dispatched
    pub msg_actions_executed: u32,
    /// Per-slot application monitor states, in slot order
    pub app_states: Vec<AppMonitorState, MAX_MONITORED_APPS>,
    /// Per-row event monitor states, in table order
    pub event_states: Vec<EventRowState, MAX_WATCHED_EVENTS>,
    /// Latest busy level (basis 10000 = 100.00%)
    pub current_util: u32,
    /// Rolling average busy level
    pub avg_util: u32,
    /// Rolling peak busy level
    pub peak_util: u32,
    /// Latest idle execution interval
    pub last_idle_interval: u32,
}
