//! Core engine systems
//!
//! Engine state and tick driver, collaborator trait seams, typed engine
//! events, logging macros, and mock collaborators for host testing.

pub mod engine;
pub mod events;
pub mod logging;
pub mod mock;
pub mod traits;
