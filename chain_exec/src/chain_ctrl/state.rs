//! Implementations for the ChainCtrl state structure

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, error, info, trace, warn};
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

// Internal
use super::{ChainCmd, ChainCtrlError, GoalTracker, ModeSwitchPolicy, Params};
use crate::actuator::{ActuatorChain, ActuatorError};
use comms_if::{
    eqpt::chain::ChainParams,
    tc::chain_ctrl::{GoalId, GoalState, GoalStatus, OperationMode, Trajectory, VelocityCmd},
    tm::ControllerStateTm,
};
use util::{module::State, time::seconds_to_std};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Message attached to goals aborted by a stop request.
pub const STOPPED_MSG: &str = "stopped";

/// Message attached to goals aborted by a cancel request.
pub const CANCELLED_MSG: &str = "cancelled";

/// Message attached to goals aborted by a recover request.
pub const RECOVERED_MSG: &str = "recovered";

/// Longest settle delay accepted in the parameters.
///
/// Units: seconds
pub const MAX_SETTLE_DELAY_S: f64 = 60.0;

/// Message attached to goals aborted by a mode switch under the discard policy.
pub const DISCARDED_MSG: &str = "trajectory discarded on operation mode change";

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Chain control module state
pub struct ChainCtrl {
    pub(crate) params: Params,

    pub(crate) chain_params: ChainParams,

    initialised: bool,

    mode: OperationMode,

    traj: Trajectory,

    /// Index of the next trajectory point to issue, equal to the trajectory length once
    /// exhausted.
    cursor: usize,

    /// No point is issued before this instant
    hold_until: Option<Instant>,

    vel_cmd: Vec<f64>,

    new_vel: bool,

    goals: GoalTracker,

    /// Latched hardware fault message
    fault: Option<String>,

    /// Last issued trajectory point after limiting
    desired: Option<Vec<f64>>,

    /// Command handed out by `proc` which has not been reported back yet
    pending: Option<Issued>,

    report: StatusReport,
}

/// Data required to initialise ChainCtrl.
pub struct InitData {
    pub params: Params,
    pub chain_params: ChainParams,
}

/// Input data to Chain Control.
pub struct InputData {
    /// True if the actuator chain reports that it is still moving.
    pub is_moving: bool,

    /// Time of this cycle.
    pub now: Instant,
}

/// Status report for ChainCtrl processing.
#[derive(Clone, Default, Serialize, Deserialize, Debug, PartialEq)]
pub struct StatusReport {
    pub initialised: bool,

    pub mode: OperationMode,

    /// Index of the trajectory point issued this cycle
    pub point_issued: Option<usize>,

    pub velocity_issued: bool,

    /// A point is due but the chain is still moving
    pub waiting_for_motion: bool,

    /// Holding after a goal was accepted
    pub settling: bool,

    pub faulted: bool,

    pub abs_pos_limited: Vec<bool>,

    pub rate_limited: Vec<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Issued {
    Point { index: usize, last: bool },
    Velocity,
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Default for ChainCtrl {
    fn default() -> Self {
        let params = Params::default();
        let goals = GoalTracker::new(params.goal_history_len);

        Self {
            mode: params.initial_mode,
            params,
            chain_params: ChainParams {
                can_module: String::new(),
                can_device: 0,
                can_baudrate: 0,
                joints: Vec::new(),
            },
            initialised: false,
            traj: Trajectory::default(),
            cursor: 0,
            hold_until: None,
            vel_cmd: Vec::new(),
            new_vel: false,
            goals,
            fault: None,
            desired: None,
            pending: None,
            report: StatusReport::default(),
        }
    }
}

impl State for ChainCtrl {
    type InitData = InitData;
    type InitError = ChainCtrlError;

    type InputData = InputData;
    type OutputData = Option<ChainCmd>;
    type StatusReport = StatusReport;
    type ProcError = ChainCtrlError;

    /// Initialise the ChainCtrl module.
    ///
    /// This does not touch the hardware, see [`ChainCtrl::init_chain`].
    fn init(&mut self, init_data: Self::InitData) -> Result<(), Self::InitError> {
        let InitData {
            params,
            chain_params,
        } = init_data;

        if !(params.settle_delay_s >= 0.0 && params.settle_delay_s <= MAX_SETTLE_DELAY_S) {
            return Err(ChainCtrlError::InvalidParams(format!(
                "settle_delay_s must be between 0 and {} seconds, got {}",
                MAX_SETTLE_DELAY_S, params.settle_delay_s
            )));
        }
        if !(params.goal_poll_interval_s.is_finite() && params.goal_poll_interval_s > 0.0) {
            return Err(ChainCtrlError::InvalidParams(format!(
                "goal_poll_interval_s must be a positive number of seconds, got {}",
                params.goal_poll_interval_s
            )));
        }
        if chain_params.joints.is_empty() {
            return Err(ChainCtrlError::InvalidParams(
                "the chain has no joints".into(),
            ));
        }

        *self = Self {
            mode: params.initial_mode,
            goals: GoalTracker::new(params.goal_history_len),
            vel_cmd: vec![0.0; chain_params.num_joints()],
            params,
            chain_params,
            ..Self::default()
        };

        debug!(
            "ChainCtrl initialised for joints {:?} in {} mode",
            self.chain_params.joint_names(),
            self.mode
        );

        Ok(())
    }

    /// Perform cyclic processing of Chain Control.
    ///
    /// Decides at most one command for the actuator chain. The caller must issue the command and
    /// report the result with [`ChainCtrl::handle_actuation`] before the next cycle.
    fn proc(
        &mut self,
        input_data: &Self::InputData,
    ) -> Result<(Self::OutputData, Self::StatusReport), Self::ProcError> {
        // Clear the status report
        let num_joints = self.chain_params.num_joints();
        self.report = StatusReport {
            initialised: self.initialised,
            mode: self.mode,
            faulted: self.fault.is_some(),
            abs_pos_limited: vec![false; num_joints],
            rate_limited: vec![false; num_joints],
            ..Default::default()
        };
        self.pending = None;

        if !self.initialised {
            trace!("ChainCtrl not initialised, nothing to do");
            return Ok((None, self.report.clone()));
        }

        if let Some(ref f) = self.fault {
            trace!("ChainCtrl holding on latched fault: {}", f);
            return Ok((None, self.report.clone()));
        }

        let cmd = match self.mode {
            OperationMode::Position => self.proc_position(input_data),
            OperationMode::Velocity => self.proc_velocity(),
        };

        Ok((cmd, self.report.clone()))
    }
}

impl ChainCtrl {
    // ---- CYCLIC PROCESSING ----

    /// Run one control cycle against the actuator chain.
    ///
    /// Polls the motion status when a trajectory point is due, runs [`State::proc`] and issues
    /// the resulting command.
    pub fn tick(
        &mut self,
        chain: &mut dyn ActuatorChain,
        now: Instant,
    ) -> Result<StatusReport, ChainCtrlError> {
        // A failed status query latches the fault, so proc will not issue anything
        let is_moving = match self.needs_motion_status(now) {
            true => match chain.is_moving() {
                Ok(m) => m,
                Err(e) => {
                    self.latch_fault(e.to_string());
                    false
                }
            },
            false => false,
        };

        let (cmd, _) = self.proc(&InputData { is_moving, now })?;

        if let Some(cmd) = cmd {
            let result = match cmd {
                ChainCmd::MoveToPositions(ref p) => chain.move_to_positions(p),
                ChainCmd::MoveAtVelocities(ref v) => chain.move_at_velocities(v),
            };

            if let Err(e) = self.handle_actuation(result) {
                warn!("ChainCtrl command {:?} failed: {}", cmd, e);
            }
        }

        Ok(self.report.clone())
    }

    /// Report the result of issuing the command returned by the last `proc` call.
    pub fn handle_actuation(
        &mut self,
        result: Result<(), ActuatorError>,
    ) -> Result<(), ChainCtrlError> {
        let issued = self.pending.take();

        match (issued, result) {
            (Some(Issued::Point { index, last }), Ok(())) => {
                debug!("Trajectory point {} issued", index);
                if last {
                    self.goals.finish(GoalState::Succeeded, None);
                }
                Ok(())
            }
            (_, Ok(())) => Ok(()),
            (_, Err(e)) => {
                let msg = e.to_string();
                self.latch_fault(msg.clone());
                self.report.faulted = true;
                Err(ChainCtrlError::HardwareFault(msg))
            }
        }
    }

    /// Returns true if the next cycle needs the chain's motion status.
    pub fn needs_motion_status(&self, now: Instant) -> bool {
        self.initialised
            && self.fault.is_none()
            && self.mode == OperationMode::Position
            && self.cursor < self.traj.len()
            && self.hold_until.map_or(true, |until| now >= until)
    }

    fn proc_position(&mut self, input_data: &InputData) -> Option<ChainCmd> {
        // Hold while the chain settles after a goal was accepted
        if let Some(until) = self.hold_until {
            if input_data.now < until {
                self.report.settling = true;
                return None;
            }
            self.hold_until = None;
        }

        if self.cursor >= self.traj.len() {
            return None;
        }

        if input_data.is_moving {
            trace!("Waiting for the chain to stop before point {}", self.cursor);
            self.report.waiting_for_motion = true;
            return None;
        }

        let index = self.cursor;
        let mut target = self.traj.points[index].positions.clone();
        self.limit_positions(&mut target);

        self.cursor += 1;
        self.pending = Some(Issued::Point {
            index,
            last: self.cursor == self.traj.len(),
        });
        self.report.point_issued = Some(index);
        self.desired = Some(target.clone());

        debug!(
            "Issuing trajectory point {}/{}: {:?}",
            index + 1,
            self.traj.len(),
            target
        );

        Some(ChainCmd::MoveToPositions(target))
    }

    fn proc_velocity(&mut self) -> Option<ChainCmd> {
        if !self.new_vel {
            return None;
        }
        self.new_vel = false;

        let mut velocities = self.vel_cmd.clone();
        self.limit_velocities(&mut velocities);

        self.pending = Some(Issued::Velocity);
        self.report.velocity_issued = true;

        trace!("Issuing velocities {:?}", velocities);

        Some(ChainCmd::MoveAtVelocities(velocities))
    }

    /// Clamp positions into the joint limits, raising the report flags of clamped joints.
    fn limit_positions(&mut self, positions: &mut [f64]) {
        for (i, (pos, joint)) in positions
            .iter_mut()
            .zip(self.chain_params.joints.iter())
            .enumerate()
        {
            if *pos > joint.upper_limit_rad {
                *pos = joint.upper_limit_rad;
                self.report.abs_pos_limited[i] = true;
            }
            if *pos < joint.lower_limit_rad {
                *pos = joint.lower_limit_rad;
                self.report.abs_pos_limited[i] = true;
            }
        }
    }

    /// Clamp velocities into the joint rate limits, raising the report flags of clamped joints.
    fn limit_velocities(&mut self, velocities: &mut [f64]) {
        for (i, (vel, joint)) in velocities
            .iter_mut()
            .zip(self.chain_params.joints.iter())
            .enumerate()
        {
            if vel.abs() > joint.max_vel_rads {
                *vel = joint.max_vel_rads.copysign(*vel);
                self.report.rate_limited[i] = true;
            }
        }
    }

    // ---- CONTROL REQUESTS ----

    /// Initialise the actuator chain with the chain parameters.
    pub fn init_chain(&mut self, chain: &mut dyn ActuatorChain) -> Result<(), ChainCtrlError> {
        if self.initialised {
            return Err(ChainCtrlError::AlreadyInitialised);
        }

        chain.init(&self.chain_params).map_err(|e| {
            error!("Actuator chain initialisation failed: {}", e);
            ChainCtrlError::HardwareFault(e.to_string())
        })?;

        self.initialised = true;
        info!(
            "Actuator chain initialised with {} joints",
            self.chain_params.num_joints()
        );

        Ok(())
    }

    /// Stop the chain and abandon the current trajectory.
    ///
    /// The hardware stop is issued even when the chain is not initialised.
    pub fn stop(&mut self, chain: &mut dyn ActuatorChain) -> Result<(), ChainCtrlError> {
        let result = chain.stop();

        self.cursor = self.traj.len();
        self.new_vel = false;
        self.hold_until = None;
        self.pending = None;

        match result {
            Ok(()) => {
                self.goals
                    .finish(GoalState::Aborted, Some(STOPPED_MSG.into()));
                info!("Actuator chain stopped");
                Ok(())
            }
            Err(e) => {
                let msg = e.to_string();
                if self.initialised {
                    self.latch_fault(msg.clone());
                } else {
                    warn!("Stop failed on uninitialised chain: {}", msg);
                }
                Err(ChainCtrlError::HardwareFault(msg))
            }
        }
    }

    /// Stop the chain and clear the latched fault.
    pub fn recover(&mut self, chain: &mut dyn ActuatorChain) -> Result<(), ChainCtrlError> {
        if !self.initialised {
            return Err(ChainCtrlError::AlreadyRecovered);
        }

        chain.stop().map_err(|e| {
            error!("Actuator chain recovery failed: {}", e);
            ChainCtrlError::HardwareFault(e.to_string())
        })?;

        self.cursor = self.traj.len();
        self.new_vel = false;
        self.hold_until = None;
        self.pending = None;
        self.goals
            .finish(GoalState::Aborted, Some(RECOVERED_MSG.into()));

        if let Some(f) = self.fault.take() {
            info!("Recovered from fault: {}", f);
        } else {
            info!("Actuator chain recovered");
        }

        Ok(())
    }

    /// Change the operation mode, effective from the next cycle.
    pub fn set_operation_mode(&mut self, mode: OperationMode) {
        if mode == self.mode {
            return;
        }

        if self.mode == OperationMode::Position
            && self.params.mode_switch_policy == ModeSwitchPolicy::Discard
            && self.cursor < self.traj.len()
        {
            self.cursor = self.traj.len();
            self.hold_until = None;
            self.goals
                .finish(GoalState::Aborted, Some(DISCARDED_MSG.into()));
        }

        info!("Operation mode changed from {} to {}", self.mode, mode);
        self.mode = mode;
    }

    /// Replace the velocity command, issued on the next velocity mode cycle.
    pub fn set_velocity(&mut self, cmd: VelocityCmd) -> Result<(), ChainCtrlError> {
        if !self.initialised {
            return Err(ChainCtrlError::NotInitialised);
        }
        if let Some(ref f) = self.fault {
            return Err(ChainCtrlError::Faulted(f.clone()));
        }

        let num_joints = self.chain_params.num_joints();
        if cmd.velocities.len() != num_joints {
            return Err(ChainCtrlError::InvalidCommand(format!(
                "expected {} velocities but got {}",
                num_joints,
                cmd.velocities.len()
            )));
        }
        if cmd.velocities.iter().any(|v| !v.is_finite()) {
            return Err(ChainCtrlError::InvalidCommand(
                "velocities must be finite".into(),
            ));
        }

        if self.mode != OperationMode::Velocity {
            debug!("Velocity command stored, chain is in {} mode", self.mode);
        }

        self.vel_cmd = cmd.velocities;
        self.new_vel = true;

        Ok(())
    }

    // ---- GOALS ----

    /// Accept a new trajectory goal.
    ///
    /// Preempts the executing goal, stops the chain with a zero velocity command and holds for
    /// the settle delay before the first point is issued.
    pub fn submit_goal(
        &mut self,
        traj: Trajectory,
        chain: &mut dyn ActuatorChain,
        now: Instant,
    ) -> Result<GoalId, ChainCtrlError> {
        if !self.initialised {
            return Err(ChainCtrlError::NotInitialised);
        }
        if let Some(ref f) = self.fault {
            return Err(ChainCtrlError::Faulted(f.clone()));
        }
        self.validate_goal(&traj)?;

        let id = self.goals.accept();
        info!("Goal {} has {} points", id, traj.len());

        self.traj = traj;
        self.cursor = 0;
        self.hold_until = None;
        self.desired = None;
        self.pending = None;

        // Nothing to move, so the chain is left alone
        if self.traj.is_empty() {
            self.goals.finish(GoalState::Succeeded, None);
            return Ok(id);
        }

        if let Err(e) = chain.move_at_velocities(&vec![0.0; self.chain_params.num_joints()]) {
            self.latch_fault(e.to_string());
            return Ok(id);
        }

        self.hold_until = Some(now + seconds_to_std(self.params.settle_delay_s));

        Ok(id)
    }

    /// Abort the executing goal without stopping the chain.
    ///
    /// If `id` is given it must be the executing goal.
    pub fn cancel_goal(&mut self, id: Option<GoalId>) -> Result<GoalStatus, ChainCtrlError> {
        match (self.goals.executing(), id) {
            (None, _) => return Err(ChainCtrlError::NoActiveGoal),
            (Some(g), Some(id)) if g.id != id => return Err(ChainCtrlError::NoActiveGoal),
            _ => (),
        }

        self.cursor = self.traj.len();
        self.hold_until = None;

        self.goals
            .finish(GoalState::Aborted, Some(CANCELLED_MSG.into()))
            .ok_or(ChainCtrlError::NoActiveGoal)
    }

    /// Status of the given goal.
    pub fn goal_status(&self, id: GoalId) -> Result<GoalStatus, ChainCtrlError> {
        self.goals.status(id).ok_or(ChainCtrlError::UnknownGoal(id))
    }

    /// State of the current goal, `Idle` if no goal has been accepted.
    pub fn poll_completion(&self) -> GoalState {
        self.goals.current_state()
    }

    /// Returns true if the given goal has been preempted by a newer one.
    pub fn check_preemption(&self, id: GoalId) -> Result<bool, ChainCtrlError> {
        Ok(self.goal_status(id)?.state == GoalState::Preempted)
    }

    /// Take the goals finished since the last call.
    pub fn drain_finished_goals(&mut self) -> Vec<GoalStatus> {
        self.goals.drain_finished()
    }

    fn validate_goal(&self, traj: &Trajectory) -> Result<(), ChainCtrlError> {
        let num_joints = self.chain_params.num_joints();

        if !traj.joint_names.is_empty() && traj.joint_names != self.chain_params.joint_names() {
            return Err(ChainCtrlError::InvalidGoal(format!(
                "joint names {:?} do not match the chain joints {:?}",
                traj.joint_names,
                self.chain_params.joint_names()
            )));
        }

        for (i, point) in traj.points.iter().enumerate() {
            if point.positions.len() != num_joints {
                return Err(ChainCtrlError::InvalidGoal(format!(
                    "point {} has {} positions, expected {}",
                    i,
                    point.positions.len(),
                    num_joints
                )));
            }
            if point.positions.iter().any(|p| !p.is_finite()) {
                return Err(ChainCtrlError::InvalidGoal(format!(
                    "point {} has a non-finite position",
                    i
                )));
            }
            if let Some(ref v) = point.velocities {
                if v.len() != num_joints {
                    return Err(ChainCtrlError::InvalidGoal(format!(
                        "point {} has {} velocities, expected {}",
                        i,
                        v.len(),
                        num_joints
                    )));
                }
            }
        }

        Ok(())
    }

    // ---- FAULTS ----

    /// Latch a hardware fault, aborting the executing goal with the hardware message.
    pub fn latch_fault(&mut self, msg: String) {
        error!("Actuator chain fault: {}", msg);

        self.cursor = self.traj.len();
        self.hold_until = None;
        self.new_vel = false;
        self.pending = None;
        self.goals.finish(GoalState::Aborted, Some(msg.clone()));
        self.fault = Some(msg);
    }

    // ---- ACCESSORS ----

    pub fn is_initialised(&self) -> bool {
        self.initialised
    }

    pub fn mode(&self) -> OperationMode {
        self.mode
    }

    pub fn fault(&self) -> Option<&str> {
        self.fault.as_deref()
    }

    pub fn report(&self) -> &StatusReport {
        &self.report
    }

    pub fn joint_names(&self) -> Vec<String> {
        self.chain_params.joint_names()
    }

    /// Longest time a goal waiter sleeps between checks.
    pub fn goal_poll_interval(&self) -> Duration {
        seconds_to_std(self.params.goal_poll_interval_s)
    }

    /// Snapshot of the controller for telemetry.
    pub fn controller_state(&self) -> ControllerStateTm {
        ControllerStateTm {
            joint_names: self.chain_params.joint_names(),
            mode: self.mode,
            goal: self.goals.current().cloned(),
            cursor: self.cursor,
            traj_len: self.traj.len(),
            desired_positions: self.desired.clone(),
            fault: self.fault.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// TESTS
// ---------------------------------------------------------------------------

#[cfg(test)]
mod test {
    use super::*;
    use crate::actuator::mock::{chain_params, Call, MockChain};

    fn ctrl_with(params: Params) -> (ChainCtrl, MockChain) {
        let mut ctrl = ChainCtrl::default();
        ctrl.init(InitData {
            params,
            chain_params: chain_params(&["j0", "j1"]),
        })
        .unwrap();

        let mut chain = MockChain::new();
        ctrl.init_chain(&mut chain).unwrap();
        chain.clear_calls();

        (ctrl, chain)
    }

    fn no_settle() -> Params {
        Params {
            settle_delay_s: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_two_point_trajectory() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.0, 0.0], vec![1.0, 1.0]]),
                &mut chain,
                now,
            )
            .unwrap();
        assert_eq!(chain.calls(), vec![Call::MoveAtVelocities(vec![0.0, 0.0])]);
        chain.clear_calls();

        let report = ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(report.point_issued, Some(0));
        assert_eq!(ctrl.controller_state().cursor, 1);
        assert_eq!(ctrl.goal_status(id).unwrap().state, GoalState::Executing);

        let report = ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(report.point_issued, Some(1));
        assert_eq!(ctrl.controller_state().cursor, 2);
        assert_eq!(ctrl.goal_status(id).unwrap().state, GoalState::Succeeded);

        for _ in 0..3 {
            ctrl.tick(&mut chain, now).unwrap();
        }
        assert_eq!(
            chain.calls(),
            vec![
                Call::MoveToPositions(vec![0.0, 0.0]),
                Call::MoveToPositions(vec![1.0, 1.0])
            ]
        );
        assert_eq!(ctrl.poll_completion(), GoalState::Succeeded);
    }

    #[test]
    fn test_waits_while_moving() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        ctrl.submit_goal(
            Trajectory::from_positions(vec![vec![0.5, 0.5]]),
            &mut chain,
            now,
        )
        .unwrap();

        chain.set_moving(true);
        let report = ctrl.tick(&mut chain, now).unwrap();
        assert!(report.waiting_for_motion);
        assert!(chain.position_moves().is_empty());

        chain.set_moving(false);
        let report = ctrl.tick(&mut chain, now).unwrap();
        assert!(!report.waiting_for_motion);
        assert_eq!(chain.position_moves(), vec![vec![0.5, 0.5]]);
    }

    #[test]
    fn test_settle_delay_holds_first_point() {
        let (mut ctrl, mut chain) = ctrl_with(Params::default());
        let now = Instant::now();

        ctrl.submit_goal(
            Trajectory::from_positions(vec![vec![0.5, 0.5]]),
            &mut chain,
            now,
        )
        .unwrap();

        let report = ctrl.tick(&mut chain, now + Duration::from_millis(100)).unwrap();
        assert!(report.settling);
        assert!(chain.position_moves().is_empty());

        let report = ctrl.tick(&mut chain, now + Duration::from_millis(600)).unwrap();
        assert!(!report.settling);
        assert_eq!(chain.position_moves().len(), 1);
    }

    #[test]
    fn test_empty_trajectory_succeeds_immediately() {
        let (mut ctrl, mut chain) = ctrl_with(Params::default());
        let now = Instant::now();

        let id = ctrl
            .submit_goal(Trajectory::default(), &mut chain, now)
            .unwrap();
        assert_eq!(ctrl.goal_status(id).unwrap().state, GoalState::Succeeded);

        ctrl.tick(&mut chain, now + Duration::from_secs(1)).unwrap();
        assert!(chain.calls().is_empty());
    }

    #[test]
    fn test_new_goal_preempts() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let g1 = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1], vec![0.2, 0.2], vec![0.3, 0.3]]),
                &mut chain,
                now,
            )
            .unwrap();
        ctrl.tick(&mut chain, now).unwrap();

        let g2 = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![-0.1, -0.1]]),
                &mut chain,
                now,
            )
            .unwrap();

        assert_eq!(ctrl.goal_status(g1).unwrap().state, GoalState::Preempted);
        assert!(ctrl.check_preemption(g1).unwrap());
        assert_eq!(ctrl.goal_status(g2).unwrap().state, GoalState::Executing);
        assert_eq!(ctrl.controller_state().cursor, 0);

        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(
            chain.position_moves(),
            vec![vec![0.1, 0.1], vec![-0.1, -0.1]]
        );
        assert_eq!(ctrl.goal_status(g2).unwrap().state, GoalState::Succeeded);
    }

    #[test]
    fn test_stop_halts_trajectory() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1], vec![0.2, 0.2]]),
                &mut chain,
                now,
            )
            .unwrap();
        ctrl.tick(&mut chain, now).unwrap();

        ctrl.stop(&mut chain).unwrap();
        let status = ctrl.goal_status(id).unwrap();
        assert_eq!(status.state, GoalState::Aborted);
        assert_eq!(status.message.as_deref(), Some(STOPPED_MSG));

        // Idempotent and no further points
        ctrl.stop(&mut chain).unwrap();
        for _ in 0..3 {
            ctrl.tick(&mut chain, now).unwrap();
        }
        assert_eq!(chain.position_moves(), vec![vec![0.1, 0.1]]);
        assert_eq!(ctrl.controller_state().traj_len, 2);
    }

    #[test]
    fn test_stop_issued_before_init() {
        let mut ctrl = ChainCtrl::default();
        ctrl.init(InitData {
            params: Params::default(),
            chain_params: chain_params(&["j0"]),
        })
        .unwrap();
        let mut chain = MockChain::new();

        ctrl.stop(&mut chain).unwrap();
        assert_eq!(chain.calls(), vec![Call::Stop]);

        // A failing stop before init is reported but not latched
        chain.fail_next("bus off");
        assert_eq!(
            ctrl.stop(&mut chain),
            Err(ChainCtrlError::HardwareFault("bus off".into()))
        );
        assert!(ctrl.fault().is_none());
    }

    #[test]
    fn test_velocity_commands_issue_once() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();
        ctrl.set_operation_mode(OperationMode::Velocity);

        ctrl.tick(&mut chain, now).unwrap();
        assert!(chain.velocity_moves().is_empty());

        ctrl.set_velocity(VelocityCmd {
            velocities: vec![0.2, -0.2],
        })
        .unwrap();
        let report = ctrl.tick(&mut chain, now).unwrap();
        assert!(report.velocity_issued);
        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(chain.velocity_moves(), vec![vec![0.2, -0.2]]);

        // An identical command is issued again
        ctrl.set_velocity(VelocityCmd {
            velocities: vec![0.2, -0.2],
        })
        .unwrap();
        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(chain.velocity_moves().len(), 2);
    }

    #[test]
    fn test_velocity_command_validation() {
        let mut ctrl = ChainCtrl::default();
        ctrl.init(InitData {
            params: Params::default(),
            chain_params: chain_params(&["j0", "j1"]),
        })
        .unwrap();

        assert_eq!(
            ctrl.set_velocity(VelocityCmd {
                velocities: vec![0.0, 0.0]
            }),
            Err(ChainCtrlError::NotInitialised)
        );

        ctrl.init_chain(&mut MockChain::new()).unwrap();
        assert!(matches!(
            ctrl.set_velocity(VelocityCmd {
                velocities: vec![0.0]
            }),
            Err(ChainCtrlError::InvalidCommand(_))
        ));
    }

    #[test]
    fn test_velocity_command_rejected_while_faulted() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();
        ctrl.set_operation_mode(OperationMode::Velocity);

        ctrl.latch_fault("bus off".into());
        assert_eq!(
            ctrl.set_velocity(VelocityCmd {
                velocities: vec![0.3, 0.3]
            }),
            Err(ChainCtrlError::Faulted("bus off".into()))
        );

        // Nothing is issued once the fault is cleared
        ctrl.recover(&mut chain).unwrap();
        ctrl.tick(&mut chain, now).unwrap();
        assert!(chain.velocity_moves().is_empty());

        ctrl.set_velocity(VelocityCmd {
            velocities: vec![0.3, 0.3],
        })
        .unwrap();
        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(chain.velocity_moves(), vec![vec![0.3, 0.3]]);
    }

    #[test]
    fn test_mode_switch_resumes_trajectory() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1], vec![0.2, 0.2], vec![0.3, 0.3]]),
                &mut chain,
                now,
            )
            .unwrap();
        ctrl.tick(&mut chain, now).unwrap();

        ctrl.set_operation_mode(OperationMode::Velocity);
        for _ in 0..3 {
            ctrl.tick(&mut chain, now).unwrap();
        }
        assert_eq!(chain.position_moves().len(), 1);
        assert_eq!(ctrl.goal_status(id).unwrap().state, GoalState::Executing);

        ctrl.set_operation_mode(OperationMode::Position);
        ctrl.tick(&mut chain, now).unwrap();
        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(
            chain.position_moves(),
            vec![vec![0.1, 0.1], vec![0.2, 0.2], vec![0.3, 0.3]]
        );
        assert_eq!(ctrl.goal_status(id).unwrap().state, GoalState::Succeeded);
    }

    #[test]
    fn test_mode_switch_discards_trajectory() {
        let (mut ctrl, mut chain) = ctrl_with(Params {
            mode_switch_policy: ModeSwitchPolicy::Discard,
            ..no_settle()
        });
        let now = Instant::now();

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1], vec![0.2, 0.2]]),
                &mut chain,
                now,
            )
            .unwrap();
        ctrl.tick(&mut chain, now).unwrap();

        ctrl.set_operation_mode(OperationMode::Velocity);
        let status = ctrl.goal_status(id).unwrap();
        assert_eq!(status.state, GoalState::Aborted);
        assert_eq!(status.message.as_deref(), Some(DISCARDED_MSG));

        ctrl.set_operation_mode(OperationMode::Position);
        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(chain.position_moves(), vec![vec![0.1, 0.1]]);
    }

    #[test]
    fn test_hardware_fault_aborts_and_latches() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1], vec![0.2, 0.2]]),
                &mut chain,
                now,
            )
            .unwrap();

        chain.fail_next("module 3 tracking error");
        let report = ctrl.tick(&mut chain, now).unwrap();
        assert!(report.faulted);

        let status = ctrl.goal_status(id).unwrap();
        assert_eq!(status.state, GoalState::Aborted);
        assert_eq!(status.message.as_deref(), Some("module 3 tracking error"));

        assert_eq!(
            ctrl.submit_goal(
                Trajectory::from_positions(vec![vec![0.0, 0.0]]),
                &mut chain,
                now
            ),
            Err(ChainCtrlError::Faulted("module 3 tracking error".into()))
        );

        // No further points while faulted
        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(chain.position_moves().len(), 1);

        ctrl.recover(&mut chain).unwrap();
        assert!(ctrl.fault().is_none());
        assert!(ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.0, 0.0]]),
                &mut chain,
                now
            )
            .is_ok());
    }

    #[test]
    fn test_motion_status_failure_latches_fault() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1]]),
                &mut chain,
                now,
            )
            .unwrap();

        chain.fail_queries(Some("no response from module 2"));
        let report = ctrl.tick(&mut chain, now).unwrap();
        assert!(report.faulted);
        assert!(chain.position_moves().is_empty());
        assert_eq!(ctrl.goal_status(id).unwrap().state, GoalState::Aborted);
    }

    #[test]
    fn test_failed_settle_stop_aborts_goal() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        chain.fail_next("bus off");
        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1]]),
                &mut chain,
                now,
            )
            .unwrap();

        let status = ctrl.goal_status(id).unwrap();
        assert_eq!(status.state, GoalState::Aborted);
        assert_eq!(status.message.as_deref(), Some("bus off"));
        assert_eq!(ctrl.fault(), Some("bus off"));
    }

    #[test]
    fn test_submit_before_init_is_rejected() {
        let mut ctrl = ChainCtrl::default();
        ctrl.init(InitData {
            params: Params::default(),
            chain_params: chain_params(&["j0", "j1"]),
        })
        .unwrap();
        let mut chain = MockChain::new();

        assert_eq!(
            ctrl.submit_goal(
                Trajectory::from_positions(vec![vec![0.0, 0.0]]),
                &mut chain,
                Instant::now()
            ),
            Err(ChainCtrlError::NotInitialised)
        );
        assert_eq!(ctrl.poll_completion(), GoalState::Idle);
        assert!(chain.calls().is_empty());

        // Ticks do nothing before init
        let report = ctrl.tick(&mut chain, Instant::now()).unwrap();
        assert!(!report.initialised);
    }

    #[test]
    fn test_invalid_goals_are_rejected() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let short = Trajectory::from_positions(vec![vec![0.0, 0.0], vec![0.0]]);
        assert!(matches!(
            ctrl.submit_goal(short, &mut chain, now),
            Err(ChainCtrlError::InvalidGoal(_))
        ));

        let nan = Trajectory::from_positions(vec![vec![0.0, f64::NAN]]);
        assert!(matches!(
            ctrl.submit_goal(nan, &mut chain, now),
            Err(ChainCtrlError::InvalidGoal(_))
        ));

        let mut renamed = Trajectory::from_positions(vec![vec![0.0, 0.0]]);
        renamed.joint_names = vec!["j1".into(), "j0".into()];
        assert!(matches!(
            ctrl.submit_goal(renamed, &mut chain, now),
            Err(ChainCtrlError::InvalidGoal(_))
        ));

        let mut named = Trajectory::from_positions(vec![vec![0.0, 0.0]]);
        named.joint_names = vec!["j0".into(), "j1".into()];
        assert!(ctrl.submit_goal(named, &mut chain, now).is_ok());

        assert_eq!(chain.velocity_moves().len(), 1);
    }

    #[test]
    fn test_cancel_goal() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        assert_eq!(ctrl.cancel_goal(None), Err(ChainCtrlError::NoActiveGoal));

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1], vec![0.2, 0.2]]),
                &mut chain,
                now,
            )
            .unwrap();
        ctrl.tick(&mut chain, now).unwrap();

        assert_eq!(
            ctrl.cancel_goal(Some(id + 1)),
            Err(ChainCtrlError::NoActiveGoal)
        );

        let status = ctrl.cancel_goal(Some(id)).unwrap();
        assert_eq!(status.state, GoalState::Aborted);
        assert_eq!(status.message.as_deref(), Some(CANCELLED_MSG));

        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(chain.position_moves().len(), 1);
        assert!(!chain.calls().contains(&Call::Stop));
        assert_eq!(ctrl.controller_state().traj_len, 2);
        assert_eq!(ctrl.cancel_goal(None), Err(ChainCtrlError::NoActiveGoal));
    }

    #[test]
    fn test_limits_are_enforced() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        ctrl.submit_goal(
            Trajectory::from_positions(vec![vec![3.0, -3.0]]),
            &mut chain,
            now,
        )
        .unwrap();
        let report = ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(report.abs_pos_limited, vec![true, true]);
        assert_eq!(chain.position_moves(), vec![vec![2.0, -2.0]]);
        assert_eq!(ctrl.controller_state().desired_positions, Some(vec![2.0, -2.0]));

        ctrl.set_operation_mode(OperationMode::Velocity);
        ctrl.set_velocity(VelocityCmd {
            velocities: vec![-5.0, 0.5],
        })
        .unwrap();
        let report = ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(report.rate_limited, vec![true, false]);
        assert_eq!(chain.velocity_moves().last(), Some(&vec![-1.0, 0.5]));
    }

    #[test]
    fn test_init_and_recover_guards() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        assert_eq!(
            ctrl.init_chain(&mut chain),
            Err(ChainCtrlError::AlreadyInitialised)
        );
        assert_eq!(
            ChainCtrlError::AlreadyInitialised.to_string(),
            "actuator chain already initialised"
        );

        let mut fresh = ChainCtrl::default();
        fresh
            .init(InitData {
                params: Params::default(),
                chain_params: chain_params(&["j0"]),
            })
            .unwrap();
        assert_eq!(
            fresh.recover(&mut chain),
            Err(ChainCtrlError::AlreadyRecovered)
        );

        // Failed init leaves the chain uninitialised
        chain.fail_next("no modules found");
        assert_eq!(
            fresh.init_chain(&mut chain),
            Err(ChainCtrlError::HardwareFault("no modules found".into()))
        );
        assert!(!fresh.is_initialised());
    }

    #[test]
    fn test_recover_aborts_executing_goal() {
        let (mut ctrl, mut chain) = ctrl_with(no_settle());
        let now = Instant::now();

        let id = ctrl
            .submit_goal(
                Trajectory::from_positions(vec![vec![0.1, 0.1], vec![0.2, 0.2]]),
                &mut chain,
                now,
            )
            .unwrap();
        ctrl.tick(&mut chain, now).unwrap();
        assert_eq!(ctrl.poll_completion(), GoalState::Executing);

        ctrl.recover(&mut chain).unwrap();
        assert!(chain.calls().contains(&Call::Stop));

        let status = ctrl.goal_status(id).unwrap();
        assert_eq!(status.state, GoalState::Aborted);
        assert_eq!(status.message.as_deref(), Some(RECOVERED_MSG));
        assert_eq!(ctrl.poll_completion(), GoalState::Aborted);
        assert_eq!(ctrl.check_preemption(id), Ok(false));

        // The remaining point is never issued
        for _ in 0..5 {
            ctrl.tick(&mut chain, now).unwrap();
        }
        assert_eq!(chain.position_moves().len(), 1);
        assert_eq!(ctrl.poll_completion(), GoalState::Aborted);
    }

    #[test]
    fn test_init_rejects_bad_params() {
        let mut ctrl = ChainCtrl::default();

        assert!(matches!(
            ctrl.init(InitData {
                params: Params {
                    goal_poll_interval_s: 0.0,
                    ..Default::default()
                },
                chain_params: chain_params(&["j0"]),
            }),
            Err(ChainCtrlError::InvalidParams(_))
        ));
        assert!(matches!(
            ctrl.init(InitData {
                params: Params::default(),
                chain_params: chain_params(&[]),
            }),
            Err(ChainCtrlError::InvalidParams(_))
        ));

        for settle_delay_s in &[1e30, f64::INFINITY, f64::NAN, -0.5] {
            assert!(matches!(
                ctrl.init(InitData {
                    params: Params {
                        settle_delay_s: *settle_delay_s,
                        ..Default::default()
                    },
                    chain_params: chain_params(&["j0"]),
                }),
                Err(ChainCtrlError::InvalidParams(_))
            ));
        }
        assert!(ctrl
            .init(InitData {
                params: Params {
                    settle_delay_s: MAX_SETTLE_DELAY_S,
                    ..Default::default()
                },
                chain_params: chain_params(&["j0"]),
            })
            .is_ok());
    }
}
