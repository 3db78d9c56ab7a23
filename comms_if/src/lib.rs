//! # Communications interface crate.
//!
//! Provides all common communications interfaces for the actuator chain software.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Telecommands (control requests, goals, velocity commands) and their responses
pub mod tc;

/// Telemetry published by the chain executable
pub mod tm;

/// Command and response definitions for equipment (the actuator chain)
pub mod eqpt;

/// Network module
pub mod net;
