//! # Chain Controller
//!
//! Shares one [`ChainCtrl`] and its actuator chain between the cyclic main loop and the
//! telecommand server. Every request and every cycle is a critical section over a single lock, and
//! a condition variable is notified whenever a goal may have changed state so that goal waiters
//! wake promptly.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use chrono::Utc;
use log::warn;
use std::{
    sync::{Condvar, Mutex, MutexGuard},
    time::{Duration, Instant},
};

use comms_if::{
    tc::chain_ctrl::{GoalId, GoalState, GoalStatus, OperationMode, Trajectory, VelocityCmd},
    tm::{ControllerStateTm, JointStateTm},
};
use util::module::State;

use crate::{
    actuator::ActuatorChain,
    chain_ctrl::{ChainCtrl, ChainCtrlError, InitData, StatusReport},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Thread safe handle to the chain control core and the actuator chain.
pub struct ChainController {
    shared: Mutex<Shared>,

    /// Notified on every operation which may change a goal's state
    goal_changed: Condvar,

    poll_interval: Duration,
}

struct Shared {
    ctrl: ChainCtrl,

    chain: Box<dyn ActuatorChain>,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl ChainController {
    /// Create a new controller, initialising the chain control module.
    ///
    /// The actuator chain itself is not initialised until [`ChainController::init`] is called.
    pub fn new(init_data: InitData, chain: Box<dyn ActuatorChain>) -> Result<Self, ChainCtrlError> {
        let mut ctrl = ChainCtrl::default();
        ctrl.init(init_data)?;

        Ok(Self {
            poll_interval: ctrl.goal_poll_interval(),
            shared: Mutex::new(Shared { ctrl, chain }),
            goal_changed: Condvar::new(),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Shared>, ChainCtrlError> {
        self.shared.lock().map_err(|_| ChainCtrlError::LockPoisoned)
    }

    /// Run `f` inside the critical section, then wake any goal waiters.
    fn with_core<T>(
        &self,
        f: impl FnOnce(&mut ChainCtrl, &mut dyn ActuatorChain) -> T,
    ) -> Result<T, ChainCtrlError> {
        let mut shared = self.lock()?;
        let Shared { ctrl, chain } = &mut *shared;
        let result = f(ctrl, chain.as_mut());
        drop(shared);

        self.goal_changed.notify_all();

        Ok(result)
    }

    // ---- CYCLIC PROCESSING ----

    /// Run one control cycle.
    pub fn tick(&self, now: Instant) -> Result<StatusReport, ChainCtrlError> {
        self.with_core(|ctrl, chain| ctrl.tick(chain, now))?
    }

    // ---- CONTROL REQUESTS ----

    pub fn init(&self) -> Result<(), ChainCtrlError> {
        self.with_core(|ctrl, chain| ctrl.init_chain(chain))?
    }

    pub fn stop(&self) -> Result<(), ChainCtrlError> {
        self.with_core(|ctrl, chain| ctrl.stop(chain))?
    }

    pub fn recover(&self) -> Result<(), ChainCtrlError> {
        self.with_core(|ctrl, chain| ctrl.recover(chain))?
    }

    pub fn set_operation_mode(&self, mode: OperationMode) -> Result<(), ChainCtrlError> {
        self.with_core(|ctrl, _| ctrl.set_operation_mode(mode))
    }

    pub fn set_velocity(&self, cmd: VelocityCmd) -> Result<(), ChainCtrlError> {
        self.with_core(|ctrl, _| ctrl.set_velocity(cmd))?
    }

    // ---- GOALS ----

    /// Submit a new trajectory goal, returning its ID.
    pub fn submit_goal(&self, traj: Trajectory) -> Result<GoalId, ChainCtrlError> {
        self.with_core(|ctrl, chain| ctrl.submit_goal(traj, chain, Instant::now()))?
    }

    /// Cancel the executing goal.
    pub fn cancel_goal(&self, id: Option<GoalId>) -> Result<GoalStatus, ChainCtrlError> {
        self.with_core(|ctrl, _| ctrl.cancel_goal(id))?
    }

    /// Non-blocking status of a goal.
    pub fn goal_status(&self, id: GoalId) -> Result<GoalStatus, ChainCtrlError> {
        self.lock()?.ctrl.goal_status(id)
    }

    /// Non-blocking state of the current goal.
    pub fn poll_completion(&self) -> Result<GoalState, ChainCtrlError> {
        Ok(self.lock()?.ctrl.poll_completion())
    }

    /// Returns true if the given goal has been preempted by a newer goal.
    pub fn check_preemption(&self, id: GoalId) -> Result<bool, ChainCtrlError> {
        self.lock()?.ctrl.check_preemption(id)
    }

    /// Block until the given goal finishes, or until `timeout` elapses.
    ///
    /// Returns the terminal status, or the status at the time the timeout elapsed.
    pub fn wait_for_goal(
        &self,
        id: GoalId,
        timeout: Option<Duration>,
    ) -> Result<GoalStatus, ChainCtrlError> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut shared = self.lock()?;

        loop {
            let status = shared.ctrl.goal_status(id)?;
            if status.is_terminal() {
                return Ok(status);
            }

            let mut wait = self.poll_interval;
            if let Some(deadline) = deadline {
                let now = Instant::now();
                if now >= deadline {
                    return Ok(status);
                }
                wait = wait.min(deadline - now);
            }

            shared = self
                .goal_changed
                .wait_timeout(shared, wait)
                .map_err(|_| ChainCtrlError::LockPoisoned)?
                .0;
        }
    }

    /// Submit a goal and wait for it to finish.
    pub fn execute_goal(
        &self,
        traj: Trajectory,
        timeout: Option<Duration>,
    ) -> Result<GoalStatus, ChainCtrlError> {
        let id = self.submit_goal(traj)?;
        self.wait_for_goal(id, timeout)
    }

    /// Take the goals finished since the last call.
    pub fn drain_finished_goals(&self) -> Result<Vec<GoalStatus>, ChainCtrlError> {
        Ok(self.lock()?.ctrl.drain_finished_goals())
    }

    // ---- TELEMETRY ----

    pub fn is_initialised(&self) -> Result<bool, ChainCtrlError> {
        Ok(self.lock()?.ctrl.is_initialised())
    }

    /// Sample the joint state from the chain.
    ///
    /// Returns `None` if the chain is not initialised or could not be sampled. Sampling failures
    /// are only logged, they do not fault the chain.
    pub fn joint_state(&self) -> Result<Option<JointStateTm>, ChainCtrlError> {
        let mut shared = self.lock()?;
        let Shared { ctrl, chain } = &mut *shared;

        if !ctrl.is_initialised() {
            return Ok(None);
        }

        match chain.sample() {
            Ok((positions, velocities)) => Ok(Some(JointStateTm {
                timestamp: Utc::now(),
                names: ctrl.joint_names(),
                positions,
                velocities,
            })),
            Err(e) => {
                warn!("Could not sample the joint state: {}", e);
                Ok(None)
            }
        }
    }

    pub fn controller_state(&self) -> Result<ControllerStateTm, ChainCtrlError> {
        Ok(self.lock()?.ctrl.controller_state())
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
