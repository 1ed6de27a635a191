//! Typed engine events
//!
//! Every operator-visible occurrence the engine produces is expressed as an
//! [`EngineEvent`] and handed to the event-reporter collaborator. Transport
//! (event packets, ground log, console) is outside the engine; the engine
//! only decides *what* happened and how severe it is.

use crate::utilization::UTIL_DIAG_REPORTS;

/// Event severity, mirrored by the external event transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventSeverity {
    /// Command acknowledgements and configuration changes
    Debug,
    /// Nominal reports (diagnostics dumps)
    Info,
    /// Monitor trips and rejected inputs
    Error,
    /// Safety responses in flight (resets, hogging)
    Critical,
}

/// Engine event record
///
/// Variants carry only plain integers so records stay `Copy` and can be
/// buffered without allocation by whatever transport consumes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EngineEvent {
    /// An application monitor slot expired without a liveness signal
    AppStale { slot: u16, action: u8 },
    /// A watched event pattern occurred (trigger-on-occurrence row)
    EventTripped {
        row: u16,
        app_id: u32,
        event_id: u16,
        action: u8,
    },
    /// An absence deadline lapsed without the watched event arriving
    EventAbsent {
        row: u16,
        app_id: u32,
        event_id: u16,
        action: u8,
    },
    /// An action fire was consumed by an active cooldown
    ActionSuppressed { action: u8 },
    /// A message action payload was handed to the message bus
    MessageSent { action: u8 },
    /// An application restart was requested from the safety dispatcher
    AppRestartRequested { app_id: u32 },
    /// A processor reset was requested from the safety dispatcher
    ProcessorResetRequested { performed: u16 },
    /// A processor reset was withheld because the reset limit was reached
    ResetLimitReached { performed: u16, max: u16 },
    /// CPU utilization exceeded the hogging threshold for the full timeout
    CpuHogging { utilization: u32 },
    /// A ground command arrived with the wrong payload length
    InvalidCommandLength { code: u8, actual: u16, expected: u16 },
    /// The internal housekeeping request arrived with the wrong length
    InvalidHkRequestLength { actual: u16, expected: u16 },
    /// A ground command carried an unrecognized command code
    UnknownCommand { code: u8 },
    /// A force-action command named an action outside the table
    InvalidActionIndex { action: u16 },
    /// A liveness signal or monitor reset named a slot outside the table
    InvalidMonitorSlot { slot: u16 },
    /// An application monitor slot was reset by operator command
    MonitorReset { slot: u16 },
    /// Utilization conversion parameters were accepted
    UtilParamsSet { mult1: u32, div: u32, mult2: u32 },
    /// Utilization conversion parameters were rejected (zero field)
    UtilParamsRejected { mult1: u32, div: u32, mult2: u32 },
    /// The idle-sample diagnostics mask was changed
    UtilDiagMaskSet { mask: u32 },
    /// Diagnostics dump: most frequent idle timestamp deltas and how often
    /// each occurred, plus the mask active while they were recorded
    UtilDiagReport {
        mask: u32,
        entries: [(u32, u32); UTIL_DIAG_REPORTS],
    },
}

impl EngineEvent {
    /// Severity class the external transport should report this event at
    pub fn severity(&self) -> EventSeverity {
        match self {
            EngineEvent::AppStale { .. }
            | EngineEvent::EventTripped { .. }
            | EngineEvent::EventAbsent { .. }
            | EngineEvent::InvalidCommandLength { .. }
            | EngineEvent::InvalidHkRequestLength { .. }
            | EngineEvent::UnknownCommand { .. }
            | EngineEvent::InvalidActionIndex { .. }
            | EngineEvent::InvalidMonitorSlot { .. }
            | EngineEvent::UtilParamsRejected { .. }
            | EngineEvent::ResetLimitReached { .. } => EventSeverity::Error,

            EngineEvent::ProcessorResetRequested { .. } | EngineEvent::CpuHogging { .. } => {
                EventSeverity::Critical
            }

            EngineEvent::UtilDiagReport { .. } => EventSeverity::Info,

            EngineEvent::ActionSuppressed { .. }
            | EngineEvent::MessageSent { .. }
            | EngineEvent::AppRestartRequested { .. }
            | EngineEvent::MonitorReset { .. }
            | EngineEvent::UtilParamsSet { .. }
            | EngineEvent::UtilDiagMaskSet { .. } => EventSeverity::Debug,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_events_are_errors() {
        let event = EngineEvent::AppStale { slot: 3, action: 1 };
        assert_eq!(event.severity(), EventSeverity::Error);

        let event = EngineEvent::EventAbsent {
            row: 0,
            app_id: 9,
            event_id: 4,
            action: 2,
        };
        assert_eq!(event.severity(), EventSeverity::Error);
    }

    #[test]
    fn test_safety_responses_are_critical() {
        let event = EngineEvent::ProcessorResetRequested { performed: 1 };
        assert_eq!(event.severity(), EventSeverity::Critical);

        let event = EngineEvent::CpuHogging { utilization: 9950 };
        assert_eq!(event.severity(), EventSeverity::Critical);
    }

    #[test]
    fn test_acknowledgements_are_debug() {
        let event = EngineEvent::UtilDiagMaskSet { mask: 0xFFFF_FFFE };
        assert_eq!(event.severity(), EventSeverity::Debug);
    }
}
