//! Application monitor (AMT evaluator)
//!
//! Each row watches one application's liveness: a countdown is reloaded by
//! [`AppMonitor::signal`] whenever the application's liveness notification
//! arrives, and decremented once per engine tick. A countdown that reaches
//! zero is a stale transition: the row's configured action fires exactly
//! once and the row then waits for a later signal or an operator reset.

use heapless::Vec;

use crate::actions::ActionDispatcher;
use crate::core::events::EngineEvent;
use crate::core::traits::Collaborators;
use crate::log_warn;
use crate::monitors::MonitorError;
use crate::tables::{ActionIndex, AppMonitorTable, MAX_MONITORED_APPS};

/// Per-row monitor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AppMonitorState {
    /// Counting down, liveness still expected
    Waiting,
    /// Expired with a no-op action: visible in telemetry, nothing fired
    Stale,
    /// Expired and the configured action was consumed
    ActionTaken,
}

/// Runtime state for one table row
#[derive(Debug, Clone, Copy)]
struct RowStatus {
    countdown: u16,
    state: AppMonitorState,
}

/// Application monitoring table runtime
pub struct AppMonitor {
    table: AppMonitorTable,
    status: Vec<RowStatus, MAX_MONITORED_APPS>,
}

impl AppMonitor {
    /// Create the monitor over a validated table
    pub fn new(table: AppMonitorTable) -> Self {
        let mut monitor = Self {
            table,
            status: Vec::new(),
        };
        monitor.rebuild_status();
        monitor
    }

    /// Replace the table wholesale, resetting all per-row state
    pub fn load_table(&mut self, table: AppMonitorTable) {
        self.table = table;
        self.rebuild_status();
    }

    /// Restart every countdown from its configured window
    ///
    /// Used at table load and when application monitoring is re-enabled.
    pub fn reset_all(&mut self) {
        self.rebuild_status();
    }

    fn rebuild_status(&mut self) {
        self.status.clear();
        for entry in self.table.rows.iter() {
            // Capacity matches the table row bound, push cannot fail
            let _ = self.status.push(RowStatus {
                countdown: entry.expected_cycles,
                state: AppMonitorState::Waiting,
            });
        }
    }

    /// Record a liveness signal for `slot`
    ///
    /// Reloads the countdown and clears any stale state. Called by the
    /// message-dispatch collaborator when the application's designated
    /// liveness notification arrives.
    pub fn signal(&mut self, slot: usize) -> Result<(), MonitorError> {
        let entry = self.table.rows.get(slot).ok_or(MonitorError::InvalidSlot)?;
        let expected = entry.expected_cycles;
        // Bounds hold by construction; checked again rather than assumed
        let status = self.status.get_mut(slot).ok_or(MonitorError::InvalidSlot)?;
        status.countdown = expected;
        status.state = AppMonitorState::Waiting;
        Ok(())
    }

    /// Operator reset of one slot (same effect as a liveness signal)
    pub fn reset_slot(&mut self, slot: usize) -> Result<(), MonitorError> {
        self.signal(slot)
    }

    /// Sweep all monitored rows for one engine cycle
    ///
    /// Decrements every waiting countdown; rows reaching zero transition to
    /// stale, report, and fire their configured action exactly once. Rows
    /// already stale are left alone until a signal or operator reset.
    pub fn tick<C: Collaborators>(&mut self, actions: &mut ActionDispatcher, c: &mut C) {
        for slot in 0..self.table.rows.len() {
            let entry = &self.table.rows[slot];
            if entry.expected_cycles == 0 {
                continue;
            }

            let Some(status) = self.status.get_mut(slot) else {
                continue;
            };
            if status.state != AppMonitorState::Waiting {
                continue;
            }

            status.countdown = status.countdown.saturating_sub(1);
            if status.countdown > 0 {
                continue;
            }

            log_warn!(
                "application '{}' stale after {} cycles",
                entry.name.as_str(),
                entry.expected_cycles
            );
            c.report(EngineEvent::AppStale {
                slot: slot as u16,
                action: entry.action,
            });

            match ActionIndex::new(entry.action) {
                Some(index) if !index.is_noact() => {
                    actions.fire(index, entry.app_id, c);
                    status.state = AppMonitorState::ActionTaken;
                }
                Some(_) => {
                    status.state = AppMonitorState::Stale;
                }
                None => {
                    // Rejected at load; reachable only through corruption
                    c.report(EngineEvent::InvalidActionIndex {
                        action: entry.action as u16,
                    });
                    status.state = AppMonitorState::Stale;
                }
            }
        }
    }

    /// Number of loaded rows
    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }

    /// Per-row states in slot order, for telemetry
    pub fn states(&self) -> impl Iterator<Item = AppMonitorState> + '_ {
        self.status.iter().map(|s| s.state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::MockCollaborators;
    use crate::tables::{ActionTableDef, AppMonitorEntry, ACTION_EVENT, ACTION_NOACT};

    fn one_row_monitor(expected_cycles: u16, action: u8) -> AppMonitor {
        let mut table = AppMonitorTable::default();
        table
            .push(AppMonitorEntry::new("CORE_APP", 7, expected_cycles, action).unwrap())
            .unwrap();
        AppMonitor::new(table)
    }

    #[test]
    fn test_stale_after_exact_window_fires_once() {
        let mut monitor = one_row_monitor(3, ACTION_EVENT);
        let mut actions = ActionDispatcher::new(ActionTableDef::default());
        let mut c = MockCollaborators::new();

        monitor.tick(&mut actions, &mut c);
        monitor.tick(&mut actions, &mut c);
        assert_eq!(monitor.states().next(), Some(AppMonitorState::Waiting));

        monitor.tick(&mut actions, &mut c);
        assert_eq!(monitor.states().next(), Some(AppMonitorState::ActionTaken));
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { slot: 0, .. })),
            1
        );

        // A fourth tick must not refire
        monitor.tick(&mut actions, &mut c);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            1
        );
    }

    #[test]
    fn test_signal_reloads_countdown() {
        let mut monitor = one_row_monitor(3, ACTION_EVENT);
        let mut actions = ActionDispatcher::new(ActionTableDef::default());
        let mut c = MockCollaborators::new();

        monitor.tick(&mut actions, &mut c);
        monitor.tick(&mut actions, &mut c);
        monitor.signal(0).unwrap();

        // Window restarts: two more ticks stay waiting
        monitor.tick(&mut actions, &mut c);
        monitor.tick(&mut actions, &mut c);
        assert_eq!(monitor.states().next(), Some(AppMonitorState::Waiting));
        assert!(c.events.is_empty());
    }

    #[test]
    fn test_signal_recovers_stale_row() {
        let mut monitor = one_row_monitor(2, ACTION_EVENT);
        let mut actions = ActionDispatcher::new(ActionTableDef::default());
        let mut c = MockCollaborators::new();

        monitor.tick(&mut actions, &mut c);
        monitor.tick(&mut actions, &mut c);
        assert_eq!(monitor.states().next(), Some(AppMonitorState::ActionTaken));

        monitor.signal(0).unwrap();
        assert_eq!(monitor.states().next(), Some(AppMonitorState::Waiting));

        // The window runs again and trips again
        monitor.tick(&mut actions, &mut c);
        monitor.tick(&mut actions, &mut c);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            2
        );
    }

    #[test]
    fn test_noact_row_goes_stale_without_firing() {
        let mut monitor = one_row_monitor(1, ACTION_NOACT);
        let mut actions = ActionDispatcher::new(ActionTableDef::default());
        let mut c = MockCollaborators::new();

        monitor.tick(&mut actions, &mut c);

        assert_eq!(monitor.states().next(), Some(AppMonitorState::Stale));
        // Stale is reported for visibility even though nothing fired
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            1
        );
        assert!(c.sent.is_empty());
        assert_eq!(c.resets, 0);
    }

    #[test]
    fn test_unmonitored_row_never_trips() {
        let mut monitor = one_row_monitor(0, ACTION_EVENT);
        let mut actions = ActionDispatcher::new(ActionTableDef::default());
        let mut c = MockCollaborators::new();

        for _ in 0..10 {
            monitor.tick(&mut actions, &mut c);
        }
        assert_eq!(monitor.states().next(), Some(AppMonitorState::Waiting));
        assert!(c.events.is_empty());
    }

    #[test]
    fn test_invalid_slot_rejected() {
        let mut monitor = one_row_monitor(3, ACTION_EVENT);
        assert_eq!(monitor.signal(1).unwrap_err(), MonitorError::InvalidSlot);
        assert_eq!(monitor.reset_slot(9).unwrap_err(), MonitorError::InvalidSlot);
    }

    #[test]
    fn test_reset_all_restarts_windows() {
        let mut monitor = one_row_monitor(2, ACTION_EVENT);
        let mut actions = ActionDispatcher::new(ActionTableDef::default());
        let mut c = MockCollaborators::new();

        monitor.tick(&mut actions, &mut c);
        monitor.tick(&mut actions, &mut c);
        assert_eq!(monitor.states().next(), Some(AppMonitorState::ActionTaken));

        monitor.reset_all();
        assert_eq!(monitor.states().next(), Some(AppMonitorState::Waiting));
    }
}
