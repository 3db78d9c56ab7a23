//! # Telecommand processor module
//!
//! The telecommand processor executes TCs on the chain controller and builds their responses.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};

// Internal
use crate::{chain_ctrl::ChainCtrlError, controller::ChainController};
use comms_if::tc::{Tc, TcResponse};

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Execute a telecommand, returning the response for the client.
pub fn exec(controller: &ChainController, tc: Tc) -> TcResponse {
    debug!("Recieved {:?}", tc);

    match tc {
        Tc::Init => to_response(controller.init()),
        Tc::Stop => to_response(controller.stop()),
        Tc::Recover => to_response(controller.recover()),
        Tc::SetOperationMode { mode } => to_response(controller.set_operation_mode(mode)),
        Tc::SubmitGoal(traj) => match controller.submit_goal(traj) {
            Ok(goal_id) => TcResponse::GoalAccepted { goal_id },
            Err(e) => {
                warn!("Goal rejected: {}", e);
                TcResponse::GoalRejected {
                    reason: e.to_string(),
                }
            }
        },
        Tc::CancelGoal { goal_id } => match controller.cancel_goal(goal_id) {
            Ok(status) => {
                info!("Goal {} cancelled", status.id);
                TcResponse::GoalStatus(status)
            }
            Err(e) => failed(e),
        },
        Tc::GoalStatus { goal_id } => match controller.goal_status(goal_id) {
            Ok(status) => TcResponse::GoalStatus(status),
            Err(e) => failed(e),
        },
        Tc::DirectCommand(cmd) => to_response(controller.set_velocity(cmd)),
    }
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn to_response(result: Result<(), ChainCtrlError>) -> TcResponse {
    match result {
        Ok(()) => TcResponse::Ok,
        Err(e) => failed(e),
    }
}

fn failed(e: ChainCtrlError) -> TcResponse {
    warn!("TC failed: {}", e);
    TcResponse::Failed {
        error_message: e.to_string(),
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        actuator::mock::{chain_params, MockChain},
        chain_ctrl::{InitData, Params},
    };
    use comms_if::tc::chain_ctrl::{GoalState, OperationMode, Trajectory, VelocityCmd};

    fn controller() -> ChainController {
        ChainController::new(
            InitData {
                params: Params::default(),
                chain_params: chain_params(&["j0", "j1"]),
            },
            Box::new(MockChain::new()),
        )
        .unwrap()
    }

    #[test]
    fn test_control_requests() {
        let controller = controller();

        assert_eq!(
            exec(&controller, Tc::Recover),
            TcResponse::Failed {
                error_message: "actuator chain already recovered".into()
            }
        );
        assert_eq!(exec(&controller, Tc::Init), TcResponse::Ok);
        assert_eq!(
            exec(&controller, Tc::Init),
            TcResponse::Failed {
                error_message: "actuator chain already initialised".into()
            }
        );
        assert_eq!(
            exec(
                &controller,
                Tc::SetOperationMode {
                    mode: OperationMode::Velocity
                }
            ),
            TcResponse::Ok
        );
        assert_eq!(
            exec(
                &controller,
                Tc::DirectCommand(VelocityCmd {
                    velocities: vec![0.1, 0.1]
                })
            ),
            TcResponse::Ok
        );
        assert!(matches!(
            exec(
                &controller,
                Tc::DirectCommand(VelocityCmd {
                    velocities: vec![0.1]
                })
            ),
            TcResponse::Failed { .. }
        ));
        assert_eq!(exec(&controller, Tc::Stop), TcResponse::Ok);
        assert_eq!(exec(&controller, Tc::Recover), TcResponse::Ok);
    }

    #[test]
    fn test_goal_requests() {
        let controller = controller();
        let traj = Trajectory::from_positions(vec![vec![0.0, 0.0]]);

        assert!(matches!(
            exec(&controller, Tc::SubmitGoal(traj.clone())),
            TcResponse::GoalRejected { .. }
        ));

        exec(&controller, Tc::Init);
        let goal_id = match exec(&controller, Tc::SubmitGoal(traj)) {
            TcResponse::GoalAccepted { goal_id } => goal_id,
            r => panic!("Expected GoalAccepted, got {:?}", r),
        };

        match exec(&controller, Tc::GoalStatus { goal_id }) {
            TcResponse::GoalStatus(s) => assert_eq!(s.state, GoalState::Executing),
            r => panic!("Expected GoalStatus, got {:?}", r),
        }

        match exec(&controller, Tc::CancelGoal { goal_id: None }) {
            TcResponse::GoalStatus(s) => {
                assert_eq!(s.id, goal_id);
                assert_eq!(s.state, GoalState::Aborted);
            }
            r => panic!("Expected GoalStatus, got {:?}", r),
        }

        assert!(matches!(
            exec(&controller, Tc::CancelGoal { goal_id: None }),
            TcResponse::Failed { .. }
        ));
        assert!(matches!(
            exec(&controller, Tc::GoalStatus { goal_id: 99 }),
            TcResponse::Failed { .. }
        ));
    }
}
