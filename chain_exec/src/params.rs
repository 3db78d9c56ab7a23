//! # Chain Executable Parameters
//!
//! This module provide parameters for the chain executable, and the per-joint chain parameter
//! file which is converted into the [`ChainParams`] bundle passed to the actuator chain.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use comms_if::eqpt::chain::{ChainParams, JointParams};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainExecParams {
    /// Target period of one cycle.
    ///
    /// Units: seconds
    pub cycle_period_s: f64,

    /// Which actuator chain implementation to drive
    pub actuator: ActuatorKind,

    /// Network endpoint of the mechanisms server demands socket, required for the `mech`
    /// actuator
    #[serde(default)]
    pub demands_endpoint: Option<String>,

    /// Chain parameter file, relative to the params directory
    pub chain_params_file: String,

    /// ChainCtrl parameter file, relative to the params directory
    pub chain_ctrl_params_file: String,
}

/// Contents of the chain parameter file.
///
/// Every array holds one value per joint, in chain order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainFileParams {
    pub can_module: String,
    pub can_device: i32,
    pub can_baudrate: i32,

    pub module_ids: Vec<i32>,
    pub joint_names: Vec<String>,

    /// Units: radians/second^2
    pub max_acc: Vec<f64>,

    /// Units: radians/second
    pub max_vel: Vec<f64>,

    /// Units: radians
    pub lower_limits: Vec<f64>,

    /// Units: radians
    pub upper_limits: Vec<f64>,

    /// Units: radians
    pub offsets: Vec<f64>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActuatorKind {
    /// In-process simulated chain
    Sim,

    /// Chain driven through the mechanisms server
    Mech,
}

/// Errors in the startup configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("The chain has no joints")]
    NoJoints,

    #[error("Expected {expected} values in {field} (one per joint) but found {actual}")]
    SizeMismatch {
        field: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Joint name {0} is used more than once")]
    DuplicateJoint(String),

    #[error("Joint {joint} has its lower limit ({lower}) above its upper limit ({upper})")]
    InvertedLimits { joint: String, lower: f64, upper: f64 },

    #[error("Joint {joint} must have a positive {field}, found {value}")]
    NonPositiveLimit {
        joint: String,
        field: &'static str,
        value: f64,
    },

    #[error("Joint {joint} has a non-finite {field}")]
    NonFinite { joint: String, field: &'static str },

    #[error("The mech actuator requires demands_endpoint to be set")]
    MissingDemandsEndpoint,

    #[error("cycle_period_s must be a positive number of seconds, found {0}")]
    InvalidCyclePeriod(f64),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChainExecParams {
    /// Check the parameters are consistent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.cycle_period_s.is_finite() && self.cycle_period_s > 0.0) {
            return Err(ConfigError::InvalidCyclePeriod(self.cycle_period_s));
        }

        if self.actuator == ActuatorKind::Mech && self.demands_endpoint.is_none() {
            return Err(ConfigError::MissingDemandsEndpoint);
        }

        Ok(())
    }
}

impl ChainFileParams {
    /// Validate the per-joint arrays and build the chain parameter bundle.
    pub fn into_chain_params(self) -> Result<ChainParams, ConfigError> {
        let num_joints = self.joint_names.len();
        if num_joints == 0 {
            return Err(ConfigError::NoJoints);
        }

        let sizes = [
            ("module_ids", self.module_ids.len()),
            ("max_acc", self.max_acc.len()),
            ("max_vel", self.max_vel.len()),
            ("lower_limits", self.lower_limits.len()),
            ("upper_limits", self.upper_limits.len()),
            ("offsets", self.offsets.len()),
        ];
        for (field, actual) in sizes.iter() {
            if *actual != num_joints {
                return Err(ConfigError::SizeMismatch {
                    field,
                    expected: num_joints,
                    actual: *actual,
                });
            }
        }

        let mut names = HashSet::new();
        let mut joints = Vec::with_capacity(num_joints);

        for (i, name) in self.joint_names.into_iter().enumerate() {
            if !names.insert(name.clone()) {
                return Err(ConfigError::DuplicateJoint(name));
            }

            let joint = JointParams {
                name,
                module_id: self.module_ids[i],
                max_acc_rads2: self.max_acc[i],
                max_vel_rads: self.max_vel[i],
                lower_limit_rad: self.lower_limits[i],
                upper_limit_rad: self.upper_limits[i],
                offset_rad: self.offsets[i],
            };
            validate_joint(&joint)?;

            joints.push(joint);
        }

        Ok(ChainParams {
            can_module: self.can_module,
            can_device: self.can_device,
            can_baudrate: self.can_baudrate,
            joints,
        })
    }
}

// ------------------------------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ------------------------------------------------------------------------------------------------

fn validate_joint(joint: &JointParams) -> Result<(), ConfigError> {
    let values = [
        ("max_acc", joint.max_acc_rads2),
        ("max_vel", joint.max_vel_rads),
        ("lower_limit", joint.lower_limit_rad),
        ("upper_limit", joint.upper_limit_rad),
        ("offset", joint.offset_rad),
    ];
    for (field, value) in values.iter() {
        if !value.is_finite() {
            return Err(ConfigError::NonFinite {
                joint: joint.name.clone(),
                field,
            });
        }
    }

    for (field, value) in values[..2].iter() {
        if *value <= 0.0 {
            return Err(ConfigError::NonPositiveLimit {
                joint: joint.name.clone(),
                field,
                value: *value,
            });
        }
    }

    if joint.lower_limit_rad > joint.upper_limit_rad {
        return Err(ConfigError::InvertedLimits {
            joint: joint.name.clone(),
            lower: joint.lower_limit_rad,
            upper: joint.upper_limit_rad,
        });
    }

    Ok(())
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
