//! # Chain library.
//!
//! This library allows other crates in the workspace (and the tests) to access items defined
//! inside the chain executable crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Actuator chain abstraction - the hardware seam, with simulated and remote implementations
pub mod actuator;

/// Chain control module - mode arbitration, trajectory sequencing and the goal lifecycle
pub mod chain_ctrl;

/// Thread safe controller - shares the chain control module with the telecommand server
pub mod controller;

/// Parameters for the chain executable
pub mod params;

/// Telecommand processor - executes telecommands on the controller
pub mod tc_processor;

/// Telecommand server - recieves telecommands from clients
pub mod tc_server;

/// Telemetry server - publishes the joint and controller state
pub mod tm_server;
