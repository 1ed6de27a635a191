//! Collaborator trait seams
//!
//! The engine never performs side effects itself: safety responses, outbound
//! messages, and event reports are requested through these traits. Platform
//! integrations implement them against the real software bus and executive
//! services; host tests use [`crate::core::mock::MockCollaborators`].

use crate::core::events::EngineEvent;

/// Executes built-in safety responses on behalf of the engine
///
/// The engine only ever *requests* these; carrying them out (and any
/// platform-specific sequencing) belongs to the implementor.
pub trait SafetyDispatch {
    /// Request a processor reset
    fn reset_processor(&mut self);

    /// Request a restart of the application identified by `app_id`
    fn restart_app(&mut self, app_id: u32);
}

/// Accepts outbound message-action payloads verbatim
pub trait MessageBus {
    /// Send a configured action payload, unmodified
    fn send(&mut self, payload: &[u8]);
}

/// Accepts typed engine events for transport
pub trait EventReporter {
    /// Report one engine event
    fn report(&mut self, event: EngineEvent);
}

/// Aggregate of all collaborator capabilities
///
/// Blanket-implemented so callers can pass a single value implementing the
/// three seams without naming each bound.
pub trait Collaborators: SafetyDispatch + MessageBus + EventReporter {}

impl<T: SafetyDispatch + MessageBus + EventReporter> Collaborators for T {}
