//! # Telemetry module
//!
//! Snapshots of the chain published by the chain executable while it is initialised.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tc::chain_ctrl::{GoalStatus, OperationMode};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Measured state of every joint, in chain order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointStateTm {
    /// Time at which the state was sampled
    pub timestamp: DateTime<Utc>,

    pub names: Vec<String>,

    /// Units: radians
    pub positions: Vec<f64>,

    /// Units: radians/second
    pub velocities: Vec<f64>,
}

/// State of the chain controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerStateTm {
    /// Names of the joints, in chain order.
    pub joint_names: Vec<String>,

    /// The active operation mode.
    pub mode: OperationMode,

    /// Status of the executing goal, or of the most recently finished one.
    pub goal: Option<GoalStatus>,

    /// Index of the next trajectory point to be issued.
    pub cursor: usize,

    /// Number of points in the current trajectory.
    pub traj_len: usize,

    /// The most recently issued trajectory point, after limiting.
    ///
    /// Units: radians
    pub desired_positions: Option<Vec<f64>>,

    /// The latched hardware fault, if any.
    pub fault: Option<String>,
}
