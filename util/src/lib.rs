//! Utility library for the actuator chain software

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod host;
pub mod logger;
pub mod module;
pub mod params;
pub mod session;
pub mod time;
