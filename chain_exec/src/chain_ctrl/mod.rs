//! Chain control module
//!
//! Arbitrates between the position (trajectory) and velocity operation modes, sequences
//! trajectory points onto the actuator chain and tracks the lifecycle of trajectory goals.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod goal;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
use comms_if::tc::chain_ctrl::GoalId;

pub use goal::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A command for the actuator chain decided by one ChainCtrl cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainCmd {
    /// Units: radians
    MoveToPositions(Vec<f64>),

    /// Units: radians/second
    MoveAtVelocities(Vec<f64>),
}

/// Possible errors that can occur during ChainCtrl operation.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChainCtrlError {
    #[error("actuator chain is not initialised")]
    NotInitialised,

    #[error("actuator chain already initialised")]
    AlreadyInitialised,

    #[error("actuator chain already recovered")]
    AlreadyRecovered,

    #[error("{0}")]
    HardwareFault(String),

    #[error("actuator chain has a latched fault, recover before commanding it: {0}")]
    Faulted(String),

    #[error("invalid goal: {0}")]
    InvalidGoal(String),

    #[error("invalid command: {0}")]
    InvalidCommand(String),

    #[error("unknown goal {0}")]
    UnknownGoal(GoalId),

    #[error("no goal is executing")]
    NoActiveGoal,

    #[error("invalid chain control parameters: {0}")]
    InvalidParams(String),

    #[error("the chain controller lock is poisoned")]
    LockPoisoned,
}
