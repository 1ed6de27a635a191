//! Health engine state and tick driver
//!
//! [`HealthEngine`] owns every table, monitor, and counter; there is no
//! ambient global state. The external scheduler drives [`HealthEngine::tick`]
//! once per cycle, the message-dispatch collaborator feeds
//! [`HealthEngine::signal`], [`HealthEngine::on_event`], and
//! [`HealthEngine::handle_command`], and the housekeeping collaborator polls
//! [`HealthEngine::housekeeping`].
//!
//! # Tick ordering
//!
//! Strictly ordered per cycle: application monitor sweep, event deadline
//! sweep, action cooldown aging, utilization monitoring sub-cadence. Table
//! loads happen between ticks (the tick path is single-threaded), so a
//! reload is never observed half-applied.

use bitflags::bitflags;

use crate::actions::ActionDispatcher;
use crate::commands::{self, Command, CommandCode, MessageKind};
use crate::core::events::EngineEvent;
use crate::core::traits::Collaborators;
use crate::monitors::{AppMonitor, EventMonitor};
use crate::tables::{
    ActionIndex, ActionTableDef, AppMonitorTable, EventMonitorTable, TableError,
};
use crate::telemetry::HousekeepingPacket;
use crate::utilization::{diag_summary, IdleCounters, UtilParams, UtilizationTracker};
use crate::{log_debug, log_info, log_warn};

bitflags! {
    /// Global monitoring gates, toggled by ground command
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MonitorFlags: u8 {
        /// Application monitor sweep enabled
        const APP_MON = 1 << 0;
        /// Event monitoring enabled
        const EVENT_MON = 1 << 1;
        /// CPU hogging detection enabled
        const CPU_HOG = 1 << 2;
    }
}

/// The monitoring and action execution engine
pub struct HealthEngine {
    apps: AppMonitor,
    events: EventMonitor,
    actions: ActionDispatcher,
    util: UtilizationTracker,
    idle: &'static IdleCounters,
    flags: MonitorFlags,
    cmd_count: u8,
    cmd_err_count: u8,
    invalid_signal_count: u32,
}

impl HealthEngine {
    /// Create an engine with empty tables and all monitoring enabled
    ///
    /// `idle` is the counter block shared with the background idle task;
    /// it lives in a `static` so both sides hold it for the life of the
    /// process.
    pub fn new(idle: &'static IdleCounters) -> Self {
        Self {
            apps: AppMonitor::new(AppMonitorTable::default()),
            events: EventMonitor::new(EventMonitorTable::default()),
            actions: ActionDispatcher::new(ActionTableDef::default()),
            util: UtilizationTracker::new(),
            idle,
            flags: MonitorFlags::all(),
            cmd_count: 0,
            cmd_err_count: 0,
            invalid_signal_count: 0,
        }
    }

    /// Counter block shared with the background idle task
    pub fn idle_counters(&self) -> &'static IdleCounters {
        self.idle
    }

    /// Accept a validated application monitoring table
    ///
    /// The table is swapped wholesale and every countdown restarts; the
    /// sweep never sees a partially-updated table.
    pub fn load_app_table(&mut self, table: AppMonitorTable) -> Result<(), TableError> {
        table.validate()?;
        log_info!("application monitor table loaded: {} rows", table.rows.len());
        self.apps.load_table(table);
        Ok(())
    }

    /// Accept a validated event monitoring table
    pub fn load_event_table(&mut self, table: EventMonitorTable) -> Result<(), TableError> {
        table.validate()?;
        log_info!("event monitor table loaded: {} rows", table.rows.len());
        self.events.load_table(table);
        Ok(())
    }

    /// Accept a validated action table
    pub fn load_action_table(&mut self, table: ActionTableDef) -> Result<(), TableError> {
        table.validate()?;
        log_info!("action table loaded: {} message actions", table.messages.len());
        self.actions.load_table(table);
        Ok(())
    }

    /// Advance the engine by one scheduler cycle
    ///
    /// Ordering is fixed: application monitor sweep, event deadline sweep,
    /// action cooldown aging, utilization monitoring sub-cadence.
    pub fn tick<C: Collaborators>(&mut self, c: &mut C) {
        if self.flags.contains(MonitorFlags::APP_MON) {
            self.apps.tick(&mut self.actions, c);
        }
        if self.flags.contains(MonitorFlags::EVENT_MON) {
            self.events.tick(&mut self.actions, c);
        }
        self.actions.tick();
        self.util
            .monitor_utilization(self.flags.contains(MonitorFlags::CPU_HOG), c);
    }

    /// Record a liveness signal for an application slot
    ///
    /// Called by the message-dispatch collaborator whenever the slot's
    /// designated liveness notification arrives. An out-of-range slot is
    /// counted and reported; it never interrupts the tick path.
    pub fn signal<C: Collaborators>(&mut self, slot: usize, c: &mut C) {
        if self.apps.signal(slot).is_err() {
            self.invalid_signal_count = self.invalid_signal_count.wrapping_add(1);
            c.report(EngineEvent::InvalidMonitorSlot { slot: slot as u16 });
        }
    }

    /// Match one inbound event record against the event table
    pub fn on_event<C: Collaborators>(&mut self, app_id: u32, event_id: u16, c: &mut C) {
        if !self.flags.contains(MonitorFlags::EVENT_MON) {
            return;
        }
        self.events.on_event(app_id, event_id, &mut self.actions, c);
    }

    /// One pass of the utilization sampler's own cadence
    pub fn utilization_mark(&mut self) {
        self.util.utilization_mark(self.idle);
    }

    /// Handle one ground command
    ///
    /// Unknown codes and wrong-length payloads are counted and reported;
    /// nothing here can stop the tick path.
    pub fn handle_command<C: Collaborators>(&mut self, raw_code: u8, payload: &[u8], c: &mut C) {
        let Some(code) = CommandCode::from_u8(raw_code) else {
            self.reject();
            log_warn!("unknown command code {}", raw_code);
            c.report(EngineEvent::UnknownCommand { code: raw_code });
            return;
        };

        if !self.verify_msg_length(MessageKind::Command(code), payload.len(), c) {
            return;
        }

        let Ok(command) = commands::decode(code, payload) else {
            // Length mismatch already handled by the guard above
            return;
        };

        match command {
            Command::Noop => {
                self.accept();
                log_info!("no-op command, engine version {}", env!("CARGO_PKG_VERSION"));
            }

            Command::ResetCounters => {
                self.cmd_count = 0;
                self.cmd_err_count = 0;
                self.invalid_signal_count = 0;
                self.events.reset_counters();
                self.actions.reset_counters();
                log_debug!("counters reset");
            }

            Command::EnableAppMon => {
                self.flags.insert(MonitorFlags::APP_MON);
                self.apps.reset_all();
                self.accept();
                log_debug!("application monitoring enabled");
            }

            Command::DisableAppMon => {
                self.flags.remove(MonitorFlags::APP_MON);
                self.accept();
                log_debug!("application monitoring disabled");
            }

            Command::EnableEventMon => {
                self.flags.insert(MonitorFlags::EVENT_MON);
                self.events.reset_all();
                self.accept();
                log_debug!("event monitoring enabled");
            }

            Command::DisableEventMon => {
                self.flags.remove(MonitorFlags::EVENT_MON);
                self.accept();
                log_debug!("event monitoring disabled");
            }

            Command::EnableCpuHog => {
                self.flags.insert(MonitorFlags::CPU_HOG);
                self.accept();
                log_debug!("cpu hogging detection enabled");
            }

            Command::DisableCpuHog => {
                self.flags.remove(MonitorFlags::CPU_HOG);
                self.accept();
                log_debug!("cpu hogging detection disabled");
            }

            Command::ResetResetsPerformed => {
                self.actions.reset_resets_performed();
                self.accept();
                log_debug!("performed-resets counter cleared");
            }

            Command::SetMaxResets { max } => {
                self.actions.set_max_resets(max);
                self.accept();
                log_debug!("processor-reset allowance set to {}", max);
            }

            Command::ReportUtilDiag => {
                let summary = diag_summary(self.idle);
                c.report(EngineEvent::UtilDiagReport {
                    mask: summary.mask,
                    entries: summary.entries,
                });
                self.accept();
            }

            Command::SetUtilParams { mult1, div, mult2 } => {
                let params = UtilParams { mult1, div, mult2 };
                if self.util.set_params(params).is_ok() {
                    self.accept();
                    c.report(EngineEvent::UtilParamsSet { mult1, div, mult2 });
                } else {
                    self.reject();
                    c.report(EngineEvent::UtilParamsRejected { mult1, div, mult2 });
                }
            }

            Command::SetUtilDiagMask { mask } => {
                self.idle.set_mask(mask);
                self.accept();
                c.report(EngineEvent::UtilDiagMaskSet { mask });
            }

            Command::ResetMonitor { slot } => {
                if self.apps.reset_slot(slot as usize).is_ok() {
                    self.accept();
                    c.report(EngineEvent::MonitorReset { slot });
                } else {
                    self.reject();
                    c.report(EngineEvent::InvalidMonitorSlot { slot });
                }
            }

            Command::ForceAction { action, app_id } => {
                let index = u8::try_from(action).ok().and_then(ActionIndex::new);
                match index {
                    Some(index) => {
                        self.accept();
                        self.actions.fire(index, app_id, c);
                    }
                    None => {
                        self.reject();
                        c.report(EngineEvent::InvalidActionIndex { action });
                    }
                }
            }
        }
    }

    /// Handle the internal housekeeping snapshot request
    ///
    /// Returns the snapshot when the request length is valid. A bad length
    /// is reported but, unlike ground commands, not counted as a command
    /// error.
    pub fn handle_hk_request<C: Collaborators>(
        &mut self,
        payload_len: usize,
        c: &mut C,
    ) -> Option<HousekeepingPacket> {
        if !self.verify_msg_length(MessageKind::HousekeepingRequest, payload_len, c) {
            return None;
        }
        Some(self.housekeeping())
    }

    /// Build a housekeeping snapshot
    pub fn housekeeping(&self) -> HousekeepingPacket {
        let mut app_states = heapless::Vec::new();
        for state in self.apps.states() {
            let _ = app_states.push(state);
        }
        let mut event_states = heapless::Vec::new();
        for state in self.events.states() {
            let _ = event_states.push(state);
        }

        HousekeepingPacket {
            cmd_count: self.cmd_count,
            cmd_err_count: self.cmd_err_count,
            monitor_flags: self.flags,
            resets_performed: self.actions.resets_performed(),
            max_resets: self.actions.max_resets(),
            events_processed: self.events.events_processed(),
            invalid_signal_count: self.invalid_signal_count,
            msg_actions_executed: self.actions.msg_actions_executed(),
            app_states,
            event_states,
            current_util: self.util.current(),
            avg_util: self.util.average(),
            peak_util: self.util.peak(),
            last_idle_interval: self.util.last_interval(),
        }
    }

    /// Length guard every message entry point runs first
    ///
    /// A mismatch reports a length-error event; only ground commands also
    /// count against the command-error counter.
    fn verify_msg_length<C: Collaborators>(
        &mut self,
        kind: MessageKind,
        actual: usize,
        c: &mut C,
    ) -> bool {
        let expected = kind.expected_len();
        if actual == expected {
            return true;
        }

        match kind {
            MessageKind::Command(code) => {
                self.reject();
                log_warn!(
                    "command {} payload length {} (expected {})",
                    code as u8,
                    actual,
                    expected
                );
                c.report(EngineEvent::InvalidCommandLength {
                    code: code as u8,
                    actual: actual as u16,
                    expected: expected as u16,
                });
            }
            MessageKind::HousekeepingRequest => {
                log_warn!(
                    "housekeeping request length {} (expected {})",
                    actual,
                    expected
                );
                c.report(EngineEvent::InvalidHkRequestLength {
                    actual: actual as u16,
                    expected: expected as u16,
                });
            }
        }
        false
    }

    fn accept(&mut self) {
        self.cmd_count = self.cmd_count.wrapping_add(1);
    }

    fn reject(&mut self) {
        self.cmd_err_count = self.cmd_err_count.wrapping_add(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::mock::MockCollaborators;
    use crate::monitors::AppMonitorState;
    use crate::tables::{AppMonitorEntry, ACTION_EVENT, ACTION_PROC_RESET};

    fn engine_with_one_app(expected_cycles: u16, action: u8) -> HealthEngine {
        static IDLE: IdleCounters = IdleCounters::new();
        let mut engine = HealthEngine::new(&IDLE);
        let mut table = AppMonitorTable::default();
        table
            .push(AppMonitorEntry::new("CORE_APP", 7, expected_cycles, action).unwrap())
            .unwrap();
        engine.load_app_table(table).unwrap();
        engine
    }

    #[test]
    fn test_stale_transition_through_engine() {
        let mut engine = engine_with_one_app(3, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        for _ in 0..3 {
            engine.tick(&mut c);
        }

        let hk = engine.housekeeping();
        assert_eq!(hk.app_states[0], AppMonitorState::ActionTaken);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            1
        );

        // No refire on further ticks
        engine.tick(&mut c);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            1
        );
    }

    #[test]
    fn test_signal_keeps_row_waiting() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        for _ in 0..10 {
            engine.tick(&mut c);
            engine.signal(0, &mut c);
        }

        assert_eq!(engine.housekeeping().app_states[0], AppMonitorState::Waiting);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            0
        );
    }

    #[test]
    fn test_invalid_signal_counted_not_fatal() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        engine.signal(5, &mut c);
        engine.tick(&mut c);

        let hk = engine.housekeeping();
        assert_eq!(hk.invalid_signal_count, 1);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::InvalidMonitorSlot { slot: 5 })),
            1
        );
    }

    #[test]
    fn test_disable_app_mon_stops_sweep() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        engine.handle_command(CommandCode::DisableAppMon as u8, &[], &mut c);
        for _ in 0..5 {
            engine.tick(&mut c);
        }
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            0
        );

        // Re-enabling restarts the window from the configured count
        engine.handle_command(CommandCode::EnableAppMon as u8, &[], &mut c);
        engine.tick(&mut c);
        assert_eq!(engine.housekeeping().app_states[0], AppMonitorState::Waiting);
        engine.tick(&mut c);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::AppStale { .. })),
            1
        );
    }

    #[test]
    fn test_unknown_command_counted() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        engine.handle_command(99, &[], &mut c);

        assert_eq!(engine.housekeeping().cmd_err_count, 1);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::UnknownCommand { code: 99 })),
            1
        );
    }

    #[test]
    fn test_wrong_length_command_counted() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        engine.handle_command(CommandCode::SetUtilDiagMask as u8, &[0x01], &mut c);

        let hk = engine.housekeeping();
        assert_eq!(hk.cmd_err_count, 1);
        assert_eq!(hk.cmd_count, 0);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::InvalidCommandLength { .. })),
            1
        );
    }

    #[test]
    fn test_hk_request_length_not_counted_as_command_error() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        assert!(engine.handle_hk_request(3, &mut c).is_none());

        assert_eq!(engine.housekeeping().cmd_err_count, 0);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::InvalidHkRequestLength { .. })),
            1
        );

        assert!(engine.handle_hk_request(0, &mut c).is_some());
    }

    #[test]
    fn test_set_util_params_round_trip() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        let mut payload = [0u8; 12];
        payload[0..4].copy_from_slice(&2u32.to_le_bytes());
        payload[4..8].copy_from_slice(&5u32.to_le_bytes());
        payload[8..12].copy_from_slice(&3u32.to_le_bytes());
        engine.handle_command(CommandCode::SetUtilParams as u8, &payload, &mut c);

        assert_eq!(engine.housekeeping().cmd_count, 1);
        assert_eq!(
            c.count_events(|e| matches!(
                e,
                EngineEvent::UtilParamsSet {
                    mult1: 2,
                    div: 5,
                    mult2: 3
                }
            )),
            1
        );

        // A zero field is rejected and prior values are retained
        payload[4..8].copy_from_slice(&0u32.to_le_bytes());
        engine.handle_command(CommandCode::SetUtilParams as u8, &payload, &mut c);
        assert_eq!(engine.housekeeping().cmd_err_count, 1);
        assert_eq!(engine.util.params().div, 5);
    }

    #[test]
    fn test_force_action_fires_through_choke_point() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        let mut payload = [0u8; 6];
        payload[0..2].copy_from_slice(&(ACTION_PROC_RESET as u16).to_le_bytes());
        engine.handle_command(CommandCode::ForceAction as u8, &payload, &mut c);

        assert_eq!(c.resets, 1);
        assert_eq!(engine.housekeeping().resets_performed, 1);
    }

    #[test]
    fn test_force_action_rejects_out_of_range() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        let mut payload = [0u8; 6];
        payload[0..2].copy_from_slice(&500u16.to_le_bytes());
        engine.handle_command(CommandCode::ForceAction as u8, &payload, &mut c);

        assert_eq!(engine.housekeeping().cmd_err_count, 1);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::InvalidActionIndex { action: 500 })),
            1
        );
    }

    #[test]
    fn test_reset_monitor_command_recovers_slot() {
        let mut engine = engine_with_one_app(1, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        engine.tick(&mut c);
        assert_eq!(
            engine.housekeeping().app_states[0],
            AppMonitorState::ActionTaken
        );

        let payload = 0u16.to_le_bytes();
        engine.handle_command(CommandCode::ResetMonitor as u8, &payload, &mut c);
        assert_eq!(engine.housekeeping().app_states[0], AppMonitorState::Waiting);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::MonitorReset { slot: 0 })),
            1
        );
    }

    #[test]
    fn test_reset_counters_clears_counts() {
        let mut engine = engine_with_one_app(2, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        engine.handle_command(CommandCode::Noop as u8, &[], &mut c);
        engine.handle_command(99, &[], &mut c);
        let hk = engine.housekeeping();
        assert_eq!((hk.cmd_count, hk.cmd_err_count), (1, 1));

        engine.handle_command(CommandCode::ResetCounters as u8, &[], &mut c);
        let hk = engine.housekeeping();
        assert_eq!((hk.cmd_count, hk.cmd_err_count), (0, 0));
    }

    #[test]
    fn test_table_reload_resets_row_state() {
        let mut engine = engine_with_one_app(1, ACTION_EVENT);
        let mut c = MockCollaborators::new();

        engine.tick(&mut c);
        assert_eq!(
            engine.housekeeping().app_states[0],
            AppMonitorState::ActionTaken
        );

        let mut table = AppMonitorTable::default();
        table
            .push(AppMonitorEntry::new("CORE_APP", 7, 4, ACTION_EVENT).unwrap())
            .unwrap();
        engine.load_app_table(table).unwrap();

        let hk = engine.housekeeping();
        assert_eq!(hk.app_states[0], AppMonitorState::Waiting);
    }

    #[test]
    fn test_set_util_diag_mask_reaches_idle_counters() {
        static IDLE: IdleCounters = IdleCounters::new();
        let mut engine = HealthEngine::new(&IDLE);
        let mut c = MockCollaborators::new();

        let payload = 0xFFFF_FFFEu32.to_le_bytes();
        engine.handle_command(CommandCode::SetUtilDiagMask as u8, &payload, &mut c);

        assert_eq!(IDLE.mask(), 0xFFFF_FFFE);
        assert_eq!(
            c.count_events(|e| matches!(e, EngineEvent::UtilDiagMaskSet { mask: 0xFFFF_FFFE })),
            1
        );
    }
}
