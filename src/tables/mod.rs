//! Monitor and action table definitions
//!
//! Tables are populated by the external load/validate collaborator and
//! handed to the engine wholesale. Row shape is fixed (`heapless` storage,
//! no reallocation); only per-row runtime state owned by the monitors
//! changes after load.
//!
//! # Validation model
//!
//! Validate on load, trust thereafter: each table exposes a
//! [`validate`](AppMonitorTable::validate) pass the engine runs before
//! accepting a load, which rejects out-of-range action indices and malformed
//! rows. The hot tick path still converts raw indices through the
//! [`ActionIndex`] checked newtype before any action-table access, as a
//! second line of defense against table corruption.

use core::fmt;

use heapless::{String, Vec};

/// Maximum number of application monitor rows
pub const MAX_MONITORED_APPS: usize = 32;

/// Maximum number of watched event rows
pub const MAX_WATCHED_EVENTS: usize = 16;

/// Maximum number of configurable message actions
pub const MAX_MSG_ACTIONS: usize = 8;

/// Maximum outbound action payload size (bytes)
pub const MAX_ACTION_PAYLOAD: usize = 64;

/// Maximum monitored application name length
pub const MAX_APP_NAME: usize = 20;

/// Reserved no-op action index
pub const ACTION_NOACT: u8 = 0;

/// Built-in action: report a watchdog event only (soft response)
pub const ACTION_EVENT: u8 = 1;

/// Built-in action: request a restart of the monitored application
pub const ACTION_APP_RESTART: u8 = 2;

/// Built-in action: request a processor reset
pub const ACTION_PROC_RESET: u8 = 3;

/// Highest non-message action index
pub const LAST_BUILTIN_ACTION: u8 = ACTION_PROC_RESET;

/// Number of built-in action slots (including the reserved no-op)
pub const NUM_BUILTIN_ACTIONS: usize = LAST_BUILTIN_ACTION as usize + 1;

/// Total size of the action index space
pub const NUM_ACTIONS: usize = NUM_BUILTIN_ACTIONS + MAX_MSG_ACTIONS;

/// Resolved meaning of an action index
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ActionKind {
    /// Valid configuration that performs no action
    NoAct,
    /// Watchdog event report only
    Event,
    /// Restart the triggering application
    AppRestart,
    /// Processor reset (subject to the reset limiter)
    ProcessorReset,
    /// Send message action table entry `0..MAX_MSG_ACTIONS`
    Message(usize),
}

/// Action index validated once at construction
///
/// The only way to obtain one is [`ActionIndex::new`], which enforces the
/// configured range `[0, LAST_BUILTIN_ACTION + MAX_MSG_ACTIONS]`. All action
/// table access goes through this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ActionIndex(u8);

impl ActionIndex {
    /// The reserved no-op index
    pub const NOACT: ActionIndex = ActionIndex(ACTION_NOACT);

    /// Validate a raw index, returning `None` outside the action space
    pub fn new(raw: u8) -> Option<Self> {
        if (raw as usize) < NUM_ACTIONS {
            Some(Self(raw))
        } else {
            None
        }
    }

    /// Raw table index
    pub fn raw(self) -> u8 {
        self.0
    }

    /// True for the reserved no-op index
    pub fn is_noact(self) -> bool {
        self.0 == ACTION_NOACT
    }

    /// Resolve the index to its configured effect
    pub fn kind(self) -> ActionKind {
        match self.0 {
            ACTION_NOACT => ActionKind::NoAct,
            ACTION_EVENT => ActionKind::Event,
            ACTION_APP_RESTART => ActionKind::AppRestart,
            ACTION_PROC_RESET => ActionKind::ProcessorReset,
            n => ActionKind::Message((n - LAST_BUILTIN_ACTION - 1) as usize),
        }
    }
}

/// Table validation error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableError {
    /// Action index outside the configured action space
    InvalidActionIndex { row: usize, value: u8 },
    /// Application name longer than `MAX_APP_NAME`
    NameTooLong,
    /// Absence-mode row configured with a zero deadline
    ZeroDeadline { row: usize },
    /// Message action with an empty payload
    EmptyPayload { slot: usize },
    /// Table row capacity exceeded
    TableFull,
}

impl fmt::Display for TableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableError::InvalidActionIndex { row, value } => {
                write!(f, "row {} action index {} out of range", row, value)
            }
            TableError::NameTooLong => write!(f, "application name too long"),
            TableError::ZeroDeadline { row } => {
                write!(f, "row {} absence deadline must be nonzero", row)
            }
            TableError::EmptyPayload { slot } => {
                write!(f, "message action {} has empty payload", slot)
            }
            TableError::TableFull => write!(f, "table row capacity exceeded"),
        }
    }
}

/// One application monitor (AMT) row
#[derive(Debug, Clone)]
pub struct AppMonitorEntry {
    /// Application name (log readability only; identity is the slot index)
    pub name: String<MAX_APP_NAME>,
    /// Platform identifier used for restart requests
    pub app_id: u32,
    /// Liveness window in engine cycles; 0 leaves the slot unmonitored
    pub expected_cycles: u16,
    /// Raw action index, range-checked by table validation
    pub action: u8,
}

impl AppMonitorEntry {
    /// Build a row, rejecting an over-long name
    pub fn new(
        name: &str,
        app_id: u32,
        expected_cycles: u16,
        action: u8,
    ) -> Result<Self, TableError> {
        let name = String::try_from(name).map_err(|_| TableError::NameTooLong)?;
        Ok(Self {
            name,
            app_id,
            expected_cycles,
            action,
        })
    }
}

/// Watch mode for one event monitor (EMT) row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventMatchMode {
    /// Fire when the watched event occurs
    Occurrence,
    /// Fire when the watched event has not occurred within `deadline` cycles
    Absence { deadline: u16 },
}

/// One event monitor (EMT) row
#[derive(Debug, Clone, Copy)]
pub struct EventMonitorEntry {
    /// Source application identifier to match
    pub app_id: u32,
    /// Event identifier to match
    pub event_id: u16,
    /// Occurrence or absence watch
    pub mode: EventMatchMode,
    /// Raw action index, range-checked by table validation
    pub action: u8,
    /// Disabled rows are skipped but keep their configuration
    pub enabled: bool,
}

/// One configurable message action
#[derive(Debug, Clone)]
pub struct MessageAction {
    /// Disabled entries fire as safe no-ops
    pub enabled: bool,
    /// Minimum cycles between effective fires of this entry
    pub cooldown: u16,
    /// Opaque payload handed to the message bus verbatim
    pub payload: Vec<u8, MAX_ACTION_PAYLOAD>,
}

impl MessageAction {
    /// Build a message action, rejecting an empty or oversized payload
    pub fn new(enabled: bool, cooldown: u16, payload: &[u8]) -> Result<Self, TableError> {
        if payload.is_empty() {
            return Err(TableError::EmptyPayload { slot: 0 });
        }
        let payload = Vec::from_slice(payload).map_err(|_| TableError::TableFull)?;
        Ok(Self {
            enabled,
            cooldown,
            payload,
        })
    }
}

/// Action table definition
///
/// Index 0 is the reserved no-op; indices `1..=LAST_BUILTIN_ACTION` are the
/// built-in safety responses; indices above map to `messages` entries in
/// order. Every entry carries its own cooldown.
#[derive(Debug, Clone, Default)]
pub struct ActionTableDef {
    /// Cooldowns for the built-in actions (slot 0 unused)
    pub builtin_cooldowns: [u16; NUM_BUILTIN_ACTIONS],
    /// Message action entries
    pub messages: Vec<MessageAction, MAX_MSG_ACTIONS>,
}

impl ActionTableDef {
    /// Row-level well-formedness check run by the engine before accepting
    pub fn validate(&self) -> Result<(), TableError> {
        for (slot, msg) in self.messages.iter().enumerate() {
            if msg.payload.is_empty() {
                return Err(TableError::EmptyPayload { slot });
            }
        }
        Ok(())
    }
}

/// Application monitoring table
#[derive(Debug, Clone, Default)]
pub struct AppMonitorTable {
    /// Monitor rows, indexed by application slot
    pub rows: Vec<AppMonitorEntry, MAX_MONITORED_APPS>,
}

impl AppMonitorTable {
    /// Append a row
    pub fn push(&mut self, entry: AppMonitorEntry) -> Result<(), TableError> {
        self.rows.push(entry).map_err(|_| TableError::TableFull)
    }

    /// Row-level well-formedness check run by the engine before accepting
    pub fn validate(&self) -> Result<(), TableError> {
        for (row, entry) in self.rows.iter().enumerate() {
            if ActionIndex::new(entry.action).is_none() {
                return Err(TableError::InvalidActionIndex {
                    row,
                    value: entry.action,
                });
            }
        }
        Ok(())
    }
}

/// Event monitoring table
#[derive(Debug, Clone, Default)]
pub struct EventMonitorTable {
    /// Watched event rows
    pub rows: Vec<EventMonitorEntry, MAX_WATCHED_EVENTS>,
}

impl EventMonitorTable {
    /// Append a row
    pub fn push(&mut self, entry: EventMonitorEntry) -> Result<(), TableError> {
        self.rows.push(entry).map_err(|_| TableError::TableFull)
    }

    /// Row-level well-formedness check run by the engine before accepting
    pub fn validate(&self) -> Result<(), TableError> {
        for (row, entry) in self.rows.iter().enumerate() {
            if ActionIndex::new(entry.action).is_none() {
                return Err(TableError::InvalidActionIndex {
                    row,
                    value: entry.action,
                });
            }
            if let EventMatchMode::Absence { deadline } = entry.mode {
                if deadline == 0 {
                    return Err(TableError::ZeroDeadline { row });
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_index_range() {
        assert!(ActionIndex::new(0).is_some());
        assert!(ActionIndex::new(LAST_BUILTIN_ACTION).is_some());
        assert!(ActionIndex::new((NUM_ACTIONS - 1) as u8).is_some());
        assert!(ActionIndex::new(NUM_ACTIONS as u8).is_none());
        assert!(ActionIndex::new(u8::MAX).is_none());
    }

    #[test]
    fn test_action_index_kinds() {
        assert_eq!(ActionIndex::NOACT.kind(), ActionKind::NoAct);
        assert_eq!(
            ActionIndex::new(ACTION_EVENT).unwrap().kind(),
            ActionKind::Event
        );
        assert_eq!(
            ActionIndex::new(ACTION_PROC_RESET).unwrap().kind(),
            ActionKind::ProcessorReset
        );
        assert_eq!(
            ActionIndex::new(LAST_BUILTIN_ACTION + 1).unwrap().kind(),
            ActionKind::Message(0)
        );
        assert_eq!(
            ActionIndex::new((NUM_ACTIONS - 1) as u8).unwrap().kind(),
            ActionKind::Message(MAX_MSG_ACTIONS - 1)
        );
    }

    #[test]
    fn test_app_entry_name_limit() {
        let entry = AppMonitorEntry::new("CORE_APP", 42, 3, ACTION_NOACT);
        assert!(entry.is_ok());

        let too_long = "a_very_long_application_name_indeed";
        let entry = AppMonitorEntry::new(too_long, 42, 3, ACTION_NOACT);
        assert_eq!(entry.unwrap_err(), TableError::NameTooLong);
    }

    #[test]
    fn test_app_table_rejects_bad_action_index() {
        let mut table = AppMonitorTable::default();
        table
            .push(AppMonitorEntry::new("CORE_APP", 1, 3, NUM_ACTIONS as u8).unwrap())
            .unwrap();
        assert_eq!(
            table.validate().unwrap_err(),
            TableError::InvalidActionIndex {
                row: 0,
                value: NUM_ACTIONS as u8
            }
        );
    }

    #[test]
    fn test_event_table_rejects_zero_deadline() {
        let mut table = EventMonitorTable::default();
        table
            .push(EventMonitorEntry {
                app_id: 1,
                event_id: 5,
                mode: EventMatchMode::Absence { deadline: 0 },
                action: ACTION_NOACT,
                enabled: true,
            })
            .unwrap();
        assert_eq!(
            table.validate().unwrap_err(),
            TableError::ZeroDeadline { row: 0 }
        );
    }

    #[test]
    fn test_message_action_rejects_empty_payload() {
        assert!(MessageAction::new(true, 2, &[]).is_err());
        assert!(MessageAction::new(true, 2, &[0xAA, 0x55]).is_ok());
    }

    #[test]
    fn test_table_capacity() {
        let mut table = AppMonitorTable::default();
        for i in 0..MAX_MONITORED_APPS {
            let entry = AppMonitorEntry::new("app", i as u32, 1, ACTION_NOACT).unwrap();
            table.push(entry).unwrap();
        }
        let extra = AppMonitorEntry::new("app", 99, 1, ACTION_NOACT).unwrap();
        assert_eq!(table.push(extra).unwrap_err(), TableError::TableFull);
    }
}
