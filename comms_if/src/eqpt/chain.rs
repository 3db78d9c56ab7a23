//! # Actuator Chain Equipment Commands
//!
//! Structures exchanged with an external mechanisms server driving the physical actuator chain.
//! The client sends a [`ChainDems`] and the server always replies with a [`ChainDemsResponse`].

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Parameters needed to initialise the actuator chain.
///
/// Joints are stored in chain order, which is the order used by every position and velocity
/// array passed to or read from the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    /// Name of the CAN interface module used to reach the chain (e.g. `"PCAN"`).
    pub can_module: String,

    /// CAN device number.
    pub can_device: i32,

    /// CAN bus baudrate.
    pub can_baudrate: i32,

    /// Per-joint parameters in chain order.
    pub joints: Vec<JointParams>,
}

/// Parameters of a single joint of the chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointParams {
    /// Name of the joint.
    pub name: String,

    /// Bus ID of the actuator module driving this joint.
    pub module_id: i32,

    /// Maximum acceleration.
    ///
    /// Units: radians/second^2
    pub max_acc_rads2: f64,

    /// Maximum velocity.
    ///
    /// Units: radians/second
    pub max_vel_rads: f64,

    /// Lowest allowed position.
    ///
    /// Units: radians
    pub lower_limit_rad: f64,

    /// Highest allowed position.
    ///
    /// Units: radians
    pub upper_limit_rad: f64,

    /// Calibration offset between the module's zero and the joint's zero.
    ///
    /// Units: radians
    pub offset_rad: f64,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Demands that are sent from the chain client to the mechanisms server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainDems {
    /// Connect to and initialise all modules of the chain.
    Init(ChainParams),

    /// Stop all motion immediately.
    Stop,

    /// Synchronously move all joints to the given positions (radians).
    MoveToPositions(Vec<f64>),

    /// Move all joints at the given velocities (radians/second).
    MoveAtVelocities(Vec<f64>),

    /// Request the current motion status and joint telemetry.
    GetStatus,
}

/// Response from the mechanisms server to a [`ChainDems`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ChainDemsResponse {
    /// The demand was accepted.
    Ok,

    /// Current status of the chain, sent in reply to [`ChainDems::GetStatus`].
    Status {
        moving: bool,
        positions: Vec<f64>,
        velocities: Vec<f64>,
    },

    /// The demand failed, the string is the hardware's error message.
    Error(String),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChainParams {
    /// Number of joints in the chain.
    pub fn num_joints(&self) -> usize {
        self.joints.len()
    }

    /// Names of the joints in chain order.
    pub fn joint_names(&self) -> Vec<String> {
        self.joints.iter().map(|j| j.name.clone()).collect()
    }
}
