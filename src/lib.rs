#![cfg_attr(not(test), no_std)]

//! vigil - Table-driven health and liveness monitoring engine
//!
//! This library implements the monitoring core of a flight-software watchdog:
//! application liveness monitoring, event pattern matching, a table-driven
//! action dispatcher, and a CPU-utilization sampler. It is driven once per
//! cycle by an external scheduler and never blocks or allocates.

// Core systems (engine state, tick driver, collaborator seams, logging)
pub mod core;

// Monitor and action table definitions with load-time validation
pub mod tables;

// Application and event monitor runtime
pub mod monitors;

// Action dispatch engine (the single side-effect choke point)
pub mod actions;

// CPU idle sampling and utilization conversion
pub mod utilization;

// Ground command decoding and length verification
pub mod commands;

// Housekeeping telemetry snapshot
pub mod telemetry;
