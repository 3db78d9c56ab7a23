//! Parameters structure for ChainCtrl

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use comms_if::tc::chain_ctrl::OperationMode;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for chain control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Params {
    /// Operation mode the chain starts in.
    pub initial_mode: OperationMode,

    /// What happens to an unfinished trajectory when switching from position to velocity mode.
    pub mode_switch_policy: ModeSwitchPolicy,

    /// Time to hold after the stop issued on accepting a goal, before its first point is sent.
    ///
    /// Units: seconds
    pub settle_delay_s: f64,

    /// Longest time a goal waiter sleeps before checking the goal again.
    ///
    /// Units: seconds
    pub goal_poll_interval_s: f64,

    /// Number of finished goals whose status remains queryable.
    pub goal_history_len: usize,
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Handling of an unfinished trajectory on a switch to velocity mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSwitchPolicy {
    /// Freeze the cursor, the trajectory resumes when position mode is entered again.
    Resume,

    /// Drop the rest of the trajectory and abort its goal.
    Discard,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for Params {
    fn default() -> Self {
        Self {
            initial_mode: OperationMode::Position,
            mode_switch_policy: ModeSwitchPolicy::Resume,
            settle_delay_s: 0.5,
            goal_poll_interval_s: 0.01,
            goal_history_len: 32,
        }
    }
}

impl Default for ModeSwitchPolicy {
    fn default() -> Self {
        ModeSwitchPolicy::Resume
    }
}
