//! Event monitor (EMT matcher)
//!
//! Watches the inbound event stream for configured (application, event)
//! patterns. Occurrence rows fire their action every time the pattern
//! arrives; absence rows arm a deadline that the pattern must keep clearing,
//! and fire once when it lapses.

use heapless::Vec;

use crate::actions::ActionDispatcher;
use crate::core::events::EngineEvent;
use crate::core::traits::Collaborators;
use crate::tables::{ActionIndex, EventMatchMode, EventMonitorTable, MAX_WATCHED_EVENTS};

/// Per-row runtime state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventRowState {
    /// Occurrence row, or a disabled row
    Idle,
    /// Absence row counting down to its deadline
    Armed { remaining: u16 },
    /// Absence row whose deadline lapsed; waits for the event to re-arm
    Lapsed,
}

/// Event monitoring table runtime
pub struct EventMonitor {
    table: EventMonitorTable,
    status: Vec<EventRowState, MAX_WATCHED_EVENTS>,
    events_processed: u32,
}

impl EventMonitor {
    /// Create the matcher over a validated table
    pub fn new(table: EventMonitorTable) -> Self {
        let mut monitor = Self {
            table,
            status: Vec::new(),
            events_processed: 0,
        };
        monitor.rebuild_status();
        monitor
    }

    /// Replace the table wholesale, resetting all per-row state
    pub fn load_table(&mut self, table: EventMonitorTable) {
        self.table = table;
        self.rebuild_status();
    }

    /// Re-arm all absence deadlines from their configured values
    pub fn reset_all(&mut self) {
        self.rebuild_status();
    }

    fn rebuild_status(&mut self) {
        self.status.clear();
        for entry in self.table.rows.iter() {
            let state = match entry.mode {
                EventMatchMode::Absence { deadline } if entry.enabled => {
                    EventRowState::Armed {
                        remaining: deadline,
                    }
                }
                _ => EventRowState::Idle,
            };
            // Capacity matches the table row bound, push cannot fail
            let _ = self.status.push(state);
        }
    }

    /// Match one inbound event record against all enabled rows
    ///
    /// Every matching enabled row acts independently; there is no dedup
    /// across rows. Occurrence rows fire immediately, absence rows clear
    /// their pending deadline back to the full window.
    pub fn on_event<C: Collaborators>(
        &mut self,
        app_id: u32,
        event_id: u16,
        actions: &mut ActionDispatcher,
        c: &mut C,
    ) {
        self.events_processed = self.events_processed.wrapping_add(1);

        for row in 0..self.table.rows.len() {
            let entry = &self.table.rows[row];
            if !entry.enabled || entry.app_id != app_id || entry.event_id != event_id {
                continue;
            }

            match entry.mode {
                EventMatchMode::Occurrence => {
                    c.report(EngineEvent::EventTripped {
                        row: row as u16,
                        app_id,
                        event_id,
                        action: entry.action,
                    });
                    match ActionIndex::new(entry.action) {
                        Some(index) => {
                            actions.fire(index, entry.app_id, c);
                        }
                        None => {
                            // Rejected at load; reachable only through corruption
                            c.report(EngineEvent::InvalidActionIndex {
                                action: entry.action as u16,
                            });
                        }
                    }
                }
                EventMatchMode::Absence { deadline } => {
                    if let Some(status) = self.status.get_mut(row) {
                        *status = EventRowState::Armed {
                            remaining: deadline,
                        };
                    }
                }
            }
        }
    }

    /// Sweep absence deadlines for one engine cycle
    ///
    /// A deadline that lapses without having been cleared fires the row's
    /// action once; the row then stays lapsed until a matching event
    /// re-arms it.
    pub fn tick<C: Collaborators>(&mut self, actions: &mut ActionDispatcher, c: &mut C) {
        for row in 0..self.table.rows.len() {
            let entry = &self.table.rows[row];
            if !entry.enabled {
                continue;
            }

            let Some(status) = self.status.get_mut(row) else {
                continue;
            };
            let EventRowState::Armed { remaining } = *status else {
                continue;
            };

            let remaining = remaining.saturating_sub(1);
            if remaining > 0 {
                *status = EventRowState::Armed { remaining };
                continue;
            }

            *status = EventRowState::Lapsed;
            c.report(EngineEvent::EventAbsent {
                row: row as u16,
                app_id: entry.app_id,
                event_id: entry.event_id,
                action: entry.action,
            });
            match ActionIndex::new(entry.action) {
                Some(index) => {
                    actions.fire(index, entry.app_id, c);
                }
                None => {
                    c.report(EngineEvent::InvalidActionIndex {
                        action: entry.action as u16,
                    });
                }
            }
        }
    }

    /// Total inbound event records matched against the table
    pub fn events_processed(&self) -> u32 {
        self.events_processed
    }

    /// Clear the processed-events counter
    pub fn reset_counters(&mut self) {
        self.events_processed = 0;
    }

    /// Number of loaded rows
    pub fn row_count(&self) -> usize {
        self.table.rows.len()
    }

    /// Per-row states in table order, for telemetry
    pub fn states(&self) -> impl Iterator<Item = EventRowState> + '_ {
        self.status.iter().copied()
    }
}
