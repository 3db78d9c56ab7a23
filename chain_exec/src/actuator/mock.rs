//! Recording actuator chain for unit tests.

use std::sync::{Arc, Mutex, MutexGuard};

use comms_if::eqpt::chain::{ChainParams, JointParams};

use super::{ActuatorChain, ActuatorError};

/// A call made on the [`MockChain`].
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Call {
    Init,
    Stop,
    MoveToPositions(Vec<f64>),
    MoveAtVelocities(Vec<f64>),
}

#[derive(Debug, Default)]
pub(crate) struct MockState {
    pub calls: Vec<Call>,
    pub moving: bool,
    pub fail_next: Option<String>,
    pub fail_queries: Option<String>,
    pub positions: Vec<f64>,
    pub last_error: Option<String>,
}

/// Actuator chain which records every command and fails on demand.
///
/// Clones share their state, so a test keeps one clone to script and inspect the chain while the
/// controller owns another.
#[derive(Debug, Clone, Default)]
pub(crate) struct MockChain {
    state: Arc<Mutex<MockState>>,
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Positions passed to every `move_to_positions` call, in order.
    pub fn position_moves(&self) -> Vec<Vec<f64>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::MoveToPositions(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    /// Velocities passed to every `move_at_velocities` call, in order.
    pub fn velocity_moves(&self) -> Vec<Vec<f64>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::MoveAtVelocities(v) => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn set_moving(&self, moving: bool) {
        self.state().moving = moving;
    }

    /// Make the next command (init, stop or move) fail with the given message.
    pub fn fail_next(&self, msg: &str) {
        self.state().fail_next = Some(msg.into());
    }

    /// Make every status query fail with the given message until cleared.
    pub fn fail_queries(&self, msg: Option<&str>) {
        self.state().fail_queries = msg.map(String::from);
    }

    fn command(&self, call: Call) -> Result<(), ActuatorError> {
        let mut state = self.state();
        state.calls.push(call);

        match state.fail_next.take() {
            Some(msg) => {
                state.last_error = Some(msg.clone());
                Err(ActuatorError::Fault(msg))
            }
            None => Ok(()),
        }
    }

    fn query(&self) -> Result<MutexGuard<'_, MockState>, ActuatorError> {
        let mut state = self.state();
        match state.fail_queries.clone() {
            Some(msg) => {
                state.last_error = Some(msg.clone());
                Err(ActuatorError::Fault(msg))
            }
            None => Ok(state),
        }
    }
}

impl ActuatorChain for MockChain {
    fn init(&mut self, params: &ChainParams) -> Result<(), ActuatorError> {
        self.command(Call::Init)?;
        self.state().positions = vec![0.0; params.num_joints()];
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.command(Call::Stop)
    }

    fn move_to_positions(&mut self, positions_rad: &[f64]) -> Result<(), ActuatorError> {
        self.command(Call::MoveToPositions(positions_rad.to_vec()))?;
        self.state().positions = positions_rad.to_vec();
        Ok(())
    }

    fn move_at_velocities(&mut self, velocities_rads: &[f64]) -> Result<(), ActuatorError> {
        self.command(Call::MoveAtVelocities(velocities_rads.to_vec()))
    }

    fn is_moving(&mut self) -> Result<bool, ActuatorError> {
        Ok(self.query()?.moving)
    }

    fn current_positions(&mut self) -> Result<Vec<f64>, ActuatorError> {
        Ok(self.query()?.positions.clone())
    }

    fn current_velocities(&mut self) -> Result<Vec<f64>, ActuatorError> {
        let state = self.query()?;
        Ok(vec![0.0; state.positions.len()])
    }

    fn last_error(&self) -> Option<String> {
        self.state().last_error.clone()
    }
}

/// Chain parameters with the given joint names, limits of +/-2 rad and 1 rad/s.
pub(crate) fn chain_params(names: &[&str]) -> ChainParams {
    ChainParams {
        can_module: "PCAN".into(),
        can_device: 15,
        can_baudrate: 500,
        joints: names
            .iter()
            .enumerate()
            .map(|(i, name)| JointParams {
                name: name.to_string(),
                module_id: i as i32 + 1,
                max_acc_rads2: 0.5,
                max_vel_rads: 1.0,
                lower_limit_rad: -2.0,
                upper_limit_rad: 2.0,
                offset_rad: 0.0,
            })
            .collect(),
    }
}
