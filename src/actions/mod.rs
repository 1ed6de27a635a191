//! Action dispatch engine
//!
//! [`ActionDispatcher::fire`] is the single choke point for every side
//! effect the engine produces. Monitors and the force-action command all
//! route through it, which is where cooldown suppression and processor-reset
//! limiting are enforced.
//!
//! # Cooldown semantics
//!
//! An entry whose cooldown is still counting down consumes the fire without
//! dispatching anything; the triggering monitor treats the action as taken.
//! A suppressed fire does not restart the cooldown, so repeated triggers
//! cannot extend the block window.

use crate::core::events::EngineEvent;
use crate::core::traits::Collaborators;
use crate::log_warn;
use crate::tables::{ActionIndex, ActionKind, ActionTableDef, NUM_ACTIONS};

/// Default processor-reset allowance
pub const DEFAULT_MAX_RESETS: u16 = 3;

/// Result of routing one fire through the table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FireOutcome {
    /// No-op index, disabled entry, or empty configuration
    NoAct,
    /// Effect handed to a collaborator
    Dispatched,
    /// Consumed by an active cooldown
    Suppressed,
    /// Processor reset withheld by the reset limiter
    LimitReached,
    /// Index did not resolve to a configured entry
    Rejected,
}

/// Runtime action table
///
/// Owns the loaded definition plus the per-entry cooldown counters. All
/// state is replaced wholesale on a table load.
pub struct ActionDispatcher {
    table: ActionTableDef,
    cooldowns: [u16; NUM_ACTIONS],
    resets_performed: u16,
    max_resets: u16,
    msg_actions_executed: u32,
}

impl ActionDispatcher {
    /// Create a dispatcher over a validated table definition
    pub fn new(table: ActionTableDef) -> Self {
        Self {
            table,
            cooldowns: [0; NUM_ACTIONS],
            resets_performed: 0,
            max_resets: DEFAULT_MAX_RESETS,
            msg_actions_executed: 0,
        }
    }

    /// Replace the table definition, clearing every cooldown
    ///
    /// The reset allowance is configuration independent of the table and is
    /// preserved across loads.
    pub fn load_table(&mut self, table: ActionTableDef) {
        self.table = table;
        self.cooldowns = [0; NUM_ACTIONS];
    }

    /// Route one action fire
    ///
    /// `app_id` identifies the application the triggering monitor was
    /// watching; it is the restart target for the app-restart built-in.
    ///
    /// Never panics: an index that does not resolve to a configured entry is
    /// reported and rejected.
    pub fn fire<C: Collaborators>(
        &mut self,
        index: ActionIndex,
        app_id: u32,
        c: &mut C,
    ) -> FireOutcome {
        let kind = index.kind();
        if kind == ActionKind::NoAct {
            return FireOutcome::NoAct;
        }

        let slot = index.raw() as usize;
        if slot >= NUM_ACTIONS {
            // Unreachable through the ActionIndex constructor; kept as the
            // hot-path bound check against corrupted state.
            c.report(EngineEvent::InvalidActionIndex {
                action: index.raw() as u16,
            });
            return FireOutcome::Rejected;
        }

        if self.cooldowns[slot] > 0 {
            c.report(EngineEvent::ActionSuppressed {
                action: index.raw(),
            });
            return FireOutcome::Suppressed;
        }

        let (outcome, cooldown) = match kind {
            ActionKind::NoAct => (FireOutcome::NoAct, 0),

            ActionKind::Event => {
                // The triggering monitor already reported the trip; the soft
                // response has no further effect to dispatch.
                (FireOutcome::Dispatched, self.table.builtin_cooldowns[slot])
            }

            ActionKind::AppRestart => {
                c.restart_app(app_id);
                c.report(EngineEvent::AppRestartRequested { app_id });
                (FireOutcome::Dispatched, self.table.builtin_cooldowns[slot])
            }

            ActionKind::ProcessorReset => {
                if self.resets_performed >= self.max_resets {
                    c.report(EngineEvent::ResetLimitReached {
                        performed: self.resets_performed,
                        max: self.max_resets,
                    });
                    return FireOutcome::LimitReached;
                }
                self.resets_performed += 1;
                c.reset_processor();
                c.report(EngineEvent::ProcessorResetRequested {
                    performed: self.resets_performed,
                });
                (FireOutcome::Dispatched, self.table.builtin_cooldowns[slot])
            }

            ActionKind::Message(entry) => match self.table.messages.get(entry) {
                Some(msg) if msg.enabled => {
                    c.send(&msg.payload);
                    c.report(EngineEvent::MessageSent {
                        action: index.raw(),
                    });
                    self.msg_actions_executed = self.msg_actions_executed.wrapping_add(1);
                    (FireOutcome::Dispatched, msg.cooldown)
                }
                Some(_) => (FireOutcome::NoAct, 0),
                None => {
                    log_warn!("message action {} not configured", index.raw());
                    c.report(EngineEvent::InvalidActionIndex {
                        action: index.raw() as u16,
                    });
                    (FireOutcome::Rejected, 0)
                }
            },
        };

        if outcome == FireOutcome::Dispatched {
            self.cooldowns[slot] = cooldown;
        }
        outcome
    }

    /// Decrement all active cooldowns by one cycle, floored at zero
    pub fn tick(&mut self) {
        for remaining in self.cooldowns.iter_mut() {
            *remaining = remaining.saturating_sub(1);
        }
    }

    /// Processor resets performed since counter reset
    pub fn resets_performed(&self) -> u16 {
        self.resets_performed
    }

    /// Configured processor-reset allowance
    pub fn max_resets(&self) -> u16 {
        self.max_resets
    }

    /// Set the processor-reset allowance
    pub fn set_max_resets(&mut self, max: u16) {
        self.max_resets = max;
    }

    /// Clear the performed-resets counter
    pub fn reset_resets_performed(&mut self) {
        self.resets_performed = 0;
    }

    /// Message actions dispatched since counter reset
    pub fn msg_actions_executed(&self) -> u32 {
        self.msg_actions_executed
    }

    /// Clear the message-action counter
    pub fn reset_counters(&mut self) {
        self.msg_actions_executed = 0;
    }
}
