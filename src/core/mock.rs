//! Mock collaborators
//!
//! Recording implementations of the collaborator seams, used by the test
//! suite and by downstream integrations that want to exercise the engine
//! without a real software bus. Always compiled, like the rest of the
//! engine's host-facing surface.

use heapless::Vec;

use crate::core::events::EngineEvent;
use crate::core::traits::{EventReporter, MessageBus, SafetyDispatch};
use crate::tables::MAX_ACTION_PAYLOAD;

/// Maximum recorded entries per channel
const MOCK_CAPACITY: usize = 16;

/// Maximum recorded events
const MOCK_EVENT_CAPACITY: usize = 64;

/// Recording collaborator set
///
/// Every request the engine makes is captured; buffers are bounded and
/// silently drop overflow (tests size their scenarios well below the caps).
#[derive(Debug, Default)]
pub struct MockCollaborators {
    /// Processor reset requests received
    pub resets: u32,
    /// Application restart requests received, in order
    pub restarts: Vec<u32, MOCK_CAPACITY>,
    /// Message payloads received, in order
    pub sent: Vec<Vec<u8, MAX_ACTION_PAYLOAD>, MOCK_CAPACITY>,
    /// Events reported, in order
    pub events: Vec<EngineEvent, MOCK_EVENT_CAPACITY>,
}

impl MockCollaborators {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// Count recorded events matching a predicate
    pub fn count_events<F: Fn(&EngineEvent) -> bool>(&self, matches: F) -> usize {
        self.events.iter().filter(|e| matches(e)).count()
    }

    /// Clear all recorded activity
    pub fn clear(&mut self) {
        self.resets = 0;
        self.restarts.clear();
        self.sent.clear();
        self.events.clear();
    }
}

impl SafetyDispatch for MockCollaborators {
    fn reset_processor(&mut self) {
        self.resets += 1;
    }

    fn restart_app(&mut self, app_id: u32) {
        let _ = self.restarts.push(app_id);
    }
}

impl MessageBus for MockCollaborators {
    fn send(&mut self, payload: &[u8]) {
        if let Ok(recorded) = Vec::from_slice(payload) {
            let _ = self.sent.push(recorded);
        }
    }
}

impl EventReporter for MockCollaborators {
    fn report(&mut self, event: EngineEvent) {
        let _ = self.events.push(event);
    }
}
