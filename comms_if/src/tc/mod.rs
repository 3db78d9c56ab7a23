//! # Telecommand module
//!
//! This module provides telecommand functionality to the communications interface. A telecommand
//! is a request sent by an operator (or any other client) to the chain executable. Every
//! telecommand is answered with exactly one [`TcResponse`].

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

pub mod chain_ctrl;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use thiserror::Error;

// Internal
use chain_ctrl::{GoalId, GoalStatus, OperationMode, Trajectory, VelocityCmd};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// A telecommand, i.e. an instruction sent to the chain executable by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Tc {
    /// Connect to and initialise the actuator chain.
    Init,

    /// Stop all motion and abandon the current trajectory.
    Stop,

    /// Clear a latched hardware fault.
    Recover,

    /// Switch the control discipline of the chain.
    SetOperationMode { mode: OperationMode },

    /// Submit a new trajectory goal, preempting any executing goal.
    SubmitGoal(Trajectory),

    /// Cancel the executing goal. If an ID is given it must match the executing goal.
    CancelGoal { goal_id: Option<GoalId> },

    /// Request the status of a goal.
    GoalStatus { goal_id: GoalId },

    /// Apply a velocity command directly, only acted on in velocity mode.
    DirectCommand(VelocityCmd),
}

/// Response to a telecommand.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TcResponse {
    /// The telecommand was executed.
    Ok,

    /// The telecommand could not be executed.
    Failed { error_message: String },

    /// A submitted goal has been accepted and is executing.
    GoalAccepted { goal_id: GoalId },

    /// A submitted goal was rejected, no state was changed.
    GoalRejected { reason: String },

    /// Reply to a [`Tc::GoalStatus`] request.
    GoalStatus(GoalStatus),

    /// The telecommand could not be parsed.
    Invalid,
}

/// Possible parsing errors.
#[derive(Debug, Error)]
pub enum TcParseError {
    #[error("TC contains invalid JSON: {0}")]
    InvalidJson(serde_json::Error),

    #[error("Could not serialise the TC: {0}")]
    SerialiseError(serde_json::Error),
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Tc {
    /// Parse a new TC from a JSON packet
    pub fn from_json(json_str: &str) -> Result<Self, TcParseError> {
        serde_json::from_str(json_str).map_err(TcParseError::InvalidJson)
    }

    /// Serialise the TC into a JSON packet
    pub fn to_json(&self) -> Result<String, TcParseError> {
        serde_json::to_string(self).map_err(TcParseError::SerialiseError)
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_tc_parse() {
        assert_eq!(Tc::from_json(r#""Init""#).unwrap(), Tc::Init);

        assert_eq!(
            Tc::from_json(r#"{"SetOperationMode": {"mode": "velocity"}}"#).unwrap(),
            Tc::SetOperationMode {
                mode: OperationMode::Velocity
            }
        );

        assert_eq!(
            Tc::from_json(r#"{"CancelGoal": {"goal_id": null}}"#).unwrap(),
            Tc::CancelGoal { goal_id: None }
        );

        let goal = Tc::from_json(r#"{"SubmitGoal": {"points": [{"positions": [0.1, 0.2]}]}}"#)
            .unwrap();
        match goal {
            Tc::SubmitGoal(traj) => assert_eq!(traj.points[0].positions, vec![0.1, 0.2]),
            other => panic!("Expected SubmitGoal, got {:?}", other),
        }
    }

    #[test]
    fn test_tc_parse_rejects_unknown_mode() {
        assert!(matches!(
            Tc::from_json(r#"{"SetOperationMode": {"mode": "torque"}}"#),
            Err(TcParseError::InvalidJson(_))
        ));
        assert!(Tc::from_json("not json").is_err());
    }
}
