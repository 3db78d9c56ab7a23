//! # Chain control telecommand payloads

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

// ------------------------------------------------------------------------------------------------
// TYPES
// ------------------------------------------------------------------------------------------------

/// Identifier given to every accepted goal, increasing with each acceptance.
pub type GoalId = u64;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// An ordered sequence of joint configurations to visit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    /// Optional joint names. If given they must match the chain's joints, in chain order.
    #[serde(default)]
    pub joint_names: Vec<String>,

    /// The points of the trajectory.
    pub points: Vec<TrajectoryPoint>,
}

/// A single point of a [`Trajectory`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryPoint {
    /// Target position of each joint.
    ///
    /// Units: radians
    pub positions: Vec<f64>,

    /// Optional velocity of each joint at this point.
    ///
    /// Units: radians/second
    #[serde(default)]
    pub velocities: Option<Vec<f64>>,

    /// Optional time at which this point should be reached, relative to the start of the
    /// trajectory.
    ///
    /// Units: seconds
    #[serde(default)]
    pub time_from_start_s: Option<f64>,
}

/// A direct velocity command for all joints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VelocityCmd {
    /// Demanded velocity of each joint, in chain order.
    ///
    /// Units: radians/second
    pub velocities: Vec<f64>,
}

/// The observable status of a goal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GoalStatus {
    /// ID of the goal.
    pub id: GoalId,

    /// Lifecycle state of the goal.
    pub state: GoalState,

    /// Reason for the state, for instance the hardware error which aborted the goal.
    pub message: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// The exclusive control discipline of the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationMode {
    /// Trajectory points are sent one at a time as position targets.
    Position,

    /// Raw velocity commands are applied directly.
    Velocity,
}

/// Lifecycle state of a goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GoalState {
    Idle,
    Executing,
    Succeeded,
    Aborted,
    Preempted,
}

/// Error returned when parsing an unknown operation mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unrecognised operation mode \"{0}\", expected \"position\" or \"velocity\"")]
pub struct UnknownModeError(pub String);

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl Trajectory {
    /// Build a trajectory from position-only points.
    pub fn from_positions(points: Vec<Vec<f64>>) -> Self {
        Self {
            joint_names: Vec::new(),
            points: points
                .into_iter()
                .map(|positions| TrajectoryPoint {
                    positions,
                    ..Default::default()
                })
                .collect(),
        }
    }

    /// Number of points in the trajectory.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Returns true if the trajectory has no points.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl GoalState {
    /// Returns true if the goal will not change state any more.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            GoalState::Succeeded | GoalState::Aborted | GoalState::Preempted
        )
    }
}

impl GoalStatus {
    /// Returns true if the goal has finished.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

impl Default for OperationMode {
    fn default() -> Self {
        OperationMode::Position
    }
}

impl FromStr for OperationMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "position" => Ok(OperationMode::Position),
            "velocity" => Ok(OperationMode::Velocity),
            _ => Err(UnknownModeError(s.into())),
        }
    }
}

impl fmt::Display for OperationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationMode::Position => write!(f, "position"),
            OperationMode::Velocity => write!(f, "velocity"),
        }
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_operation_mode_parse() {
        assert_eq!("position".parse::<OperationMode>(), Ok(OperationMode::Position));
        assert_eq!("velocity".parse::<OperationMode>(), Ok(OperationMode::Velocity));
        assert_eq!(
            "torque".parse::<OperationMode>(),
            Err(UnknownModeError("torque".into()))
        );
        assert_eq!(OperationMode::Velocity.to_string(), "velocity");
    }

    #[test]
    fn test_trajectory_json_defaults() {
        let traj: Trajectory =
            serde_json::from_str(r#"{"points": [{"positions": [0.0, 1.0]}]}"#).unwrap();

        assert!(traj.joint_names.is_empty());
        assert_eq!(traj.len(), 1);
        assert_eq!(traj.points[0].velocities, None);
        assert_eq!(traj.points[0].time_from_start_s, None);
    }

    #[test]
    fn test_goal_state_terminal() {
        assert!(!GoalState::Idle.is_terminal());
        assert!(!GoalState::Executing.is_terminal());
        assert!(GoalState::Succeeded.is_terminal());
        assert!(GoalState::Aborted.is_terminal());
        assert!(GoalState::Preempted.is_terminal());
    }
}
