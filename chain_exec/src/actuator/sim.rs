//! # Simulated actuator chain
//!
//! Integrates joint motion in-process so the executable can run without any hardware. Position
//! moves are synchronised (every joint arrives at the same time, the slowest joint moving at its
//! maximum velocity) and velocity moves stop each joint at its position limits.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{debug, trace};
use std::time::Instant;

use comms_if::eqpt::chain::ChainParams;

use super::{check_len, ActuatorChain, ActuatorError};

// ------------------------------------------------------------------------------------------------
// CONSTANTS
// ------------------------------------------------------------------------------------------------

/// Distance below which a joint is considered to have reached its target.
///
/// Units: radians
const POSITION_TOLERANCE_RAD: f64 = 1e-6;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Simulated actuator chain.
pub struct SimChain {
    params: Option<ChainParams>,

    positions_rad: Vec<f64>,

    velocities_rads: Vec<f64>,

    motion: Motion,

    last_update: Instant,

    last_error: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
enum Motion {
    Idle,

    /// Moving towards the targets with constant per-joint speeds
    ToPositions { targets_rad: Vec<f64> },

    /// Moving with the demanded velocities until stopped or at a limit
    AtVelocities,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl SimChain {
    pub fn new() -> Self {
        Self {
            params: None,
            positions_rad: Vec::new(),
            velocities_rads: Vec::new(),
            motion: Motion::Idle,
            last_update: Instant::now(),
            last_error: None,
        }
    }

    /// Advance the simulation by `dt_s` seconds.
    pub(crate) fn advance(&mut self, dt_s: f64) {
        let params = match self.params {
            Some(ref p) => p,
            None => return,
        };

        match self.motion {
            Motion::Idle => (),
            Motion::ToPositions { ref targets_rad } => {
                let mut arrived = true;

                for (i, target) in targets_rad.iter().enumerate() {
                    let remaining = target - self.positions_rad[i];
                    let step = self.velocities_rads[i].abs() * dt_s;

                    if remaining.abs() <= step || remaining.abs() < POSITION_TOLERANCE_RAD {
                        self.positions_rad[i] = *target;
                        self.velocities_rads[i] = 0.0;
                    } else {
                        self.positions_rad[i] += step * remaining.signum();
                        arrived = false;
                    }
                }

                if arrived {
                    trace!("SimChain arrived at {:?}", self.positions_rad);
                    self.motion = Motion::Idle;
                }
            }
            Motion::AtVelocities => {
                for (i, joint) in params.joints.iter().enumerate() {
                    let pos = self.positions_rad[i] + self.velocities_rads[i] * dt_s;

                    // Joints stop at their limits
                    if pos > joint.upper_limit_rad || pos < joint.lower_limit_rad {
                        self.positions_rad[i] =
                            pos.max(joint.lower_limit_rad).min(joint.upper_limit_rad);
                        self.velocities_rads[i] = 0.0;
                    } else {
                        self.positions_rad[i] = pos;
                    }
                }

                if self.velocities_rads.iter().all(|v| *v == 0.0) {
                    self.motion = Motion::Idle;
                }
            }
        }
    }

    /// Advance the simulation up to now.
    fn update(&mut self) {
        let now = Instant::now();
        let dt_s = now.duration_since(self.last_update).as_secs_f64();
        self.last_update = now;

        self.advance(dt_s);
    }

    fn params(&self) -> Result<&ChainParams, ActuatorError> {
        self.params.as_ref().ok_or(ActuatorError::NotInitialised)
    }

    fn fault(&mut self, msg: String) -> ActuatorError {
        self.last_error = Some(msg.clone());
        ActuatorError::Fault(msg)
    }
}

impl Default for SimChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ActuatorChain for SimChain {
    fn init(&mut self, params: &ChainParams) -> Result<(), ActuatorError> {
        // Modules start at their zero position, or the closest limit to it
        self.positions_rad = params
            .joints
            .iter()
            .map(|j| 0f64.max(j.lower_limit_rad).min(j.upper_limit_rad))
            .collect();
        self.velocities_rads = vec![0.0; params.num_joints()];
        self.motion = Motion::Idle;
        self.last_update = Instant::now();
        self.params = Some(params.clone());

        debug!(
            "SimChain initialised with {} joints on {} device {}",
            params.num_joints(),
            params.can_module,
            params.can_device
        );

        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.update();

        self.motion = Motion::Idle;
        for v in self.velocities_rads.iter_mut() {
            *v = 0.0;
        }

        Ok(())
    }

    fn move_to_positions(&mut self, positions_rad: &[f64]) -> Result<(), ActuatorError> {
        self.update();

        let params = self.params()?.clone();
        check_len(positions_rad, params.num_joints())?;

        for (joint, target) in params.joints.iter().zip(positions_rad) {
            if !target.is_finite()
                || *target < joint.lower_limit_rad
                || *target > joint.upper_limit_rad
            {
                return Err(self.fault(format!(
                    "target {} rad for joint {} is outside its limits",
                    target, joint.name
                )));
            }
        }

        // Time for the slowest joint to arrive at full speed
        let duration_s = params
            .joints
            .iter()
            .zip(positions_rad)
            .zip(self.positions_rad.iter())
            .map(|((joint, target), pos)| (target - pos).abs() / joint.max_vel_rads)
            .fold(0f64, f64::max);

        if duration_s <= 0.0 {
            self.motion = Motion::Idle;
            return Ok(());
        }

        // Every joint covers its distance over the same duration
        self.velocities_rads = positions_rad
            .iter()
            .zip(self.positions_rad.iter())
            .map(|(target, pos)| (target - pos) / duration_s)
            .collect();
        self.motion = Motion::ToPositions {
            targets_rad: positions_rad.to_vec(),
        };

        Ok(())
    }

    fn move_at_velocities(&mut self, velocities_rads: &[f64]) -> Result<(), ActuatorError> {
        self.update();

        let params = self.params()?.clone();
        check_len(velocities_rads, params.num_joints())?;

        if let Some(v) = velocities_rads.iter().find(|v| !v.is_finite()) {
            return Err(self.fault(format!("velocity demand {} is not finite", v)));
        }

        self.velocities_rads = params
            .joints
            .iter()
            .zip(velocities_rads)
            .map(|(joint, v)| v.max(-joint.max_vel_rads).min(joint.max_vel_rads))
            .collect();

        self.motion = match self.velocities_rads.iter().all(|v| *v == 0.0) {
            true => Motion::Idle,
            false => Motion::AtVelocities,
        };

        Ok(())
    }

    fn is_moving(&mut self) -> Result<bool, ActuatorError> {
        self.params()?;
        self.update();

        Ok(self.motion != Motion::Idle)
    }

    fn current_positions(&mut self) -> Result<Vec<f64>, ActuatorError> {
        self.params()?;
        self.update();

        Ok(self.positions_rad.clone())
    }

    fn current_velocities(&mut self) -> Result<Vec<f64>, ActuatorError> {
        self.params()?;
        self.update();

        Ok(self.velocities_rads.clone())
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
