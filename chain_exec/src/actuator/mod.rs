//! # Actuator chain interface
//!
//! The chain controller only ever talks to the [`ActuatorChain`] trait, the concrete chain is
//! picked from the executable's parameters at start-up:
//!
//! - [`sim::SimChain`] - an in-process simulated chain,
//! - [`mech::MechChain`] - a client forwarding every call to the mechanisms server.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

pub mod mech;
pub mod sim;

#[cfg(test)]
pub(crate) mod mock;

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::eqpt::chain::ChainParams;

pub use mech::MechChain;
pub use sim::SimChain;

// ------------------------------------------------------------------------------------------------
// TRAITS
// ------------------------------------------------------------------------------------------------

/// A chain of rotary actuator modules driven as one unit.
///
/// Every position and velocity array is indexed in chain order, i.e. the order of
/// [`ChainParams::joints`].
pub trait ActuatorChain: Send {
    /// Connect to and initialise every module of the chain.
    fn init(&mut self, params: &ChainParams) -> Result<(), ActuatorError>;

    /// Stop all motion immediately.
    fn stop(&mut self) -> Result<(), ActuatorError>;

    /// Move all joints to the given positions so that they arrive at the same time.
    ///
    /// Units: radians
    fn move_to_positions(&mut self, positions_rad: &[f64]) -> Result<(), ActuatorError>;

    /// Move all joints at the given velocities.
    ///
    /// Units: radians/second
    fn move_at_velocities(&mut self, velocities_rads: &[f64]) -> Result<(), ActuatorError>;

    /// Returns true if any joint of the chain is still moving.
    fn is_moving(&mut self) -> Result<bool, ActuatorError>;

    /// Measured position of every joint.
    ///
    /// Units: radians
    fn current_positions(&mut self) -> Result<Vec<f64>, ActuatorError>;

    /// Measured velocity of every joint.
    ///
    /// Units: radians/second
    fn current_velocities(&mut self) -> Result<Vec<f64>, ActuatorError>;

    /// Measured `(positions, velocities)` of every joint.
    ///
    /// Chains which read both in one transaction should override this so the two halves come
    /// from the same instant.
    fn sample(&mut self) -> Result<(Vec<f64>, Vec<f64>), ActuatorError> {
        let positions = self.current_positions()?;
        let velocities = self.current_velocities()?;
        Ok((positions, velocities))
    }

    /// The message of the most recent failure reported by the chain.
    fn last_error(&self) -> Option<String>;
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

/// Failures reported by an [`ActuatorChain`].
///
/// The `Display` of a fault is the hardware's message, unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorError {
    #[error("{0}")]
    Fault(String),

    #[error("actuator chain is not initialised")]
    NotInitialised,

    #[error("expected one value per joint ({expected}) but got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("cannot reach the actuator chain: {0}")]
    Comms(String),
}

// ------------------------------------------------------------------------------------------------
// FUNCTIONS
// ------------------------------------------------------------------------------------------------

/// Check that a demand has exactly one value per joint.
pub(crate) fn check_len(values: &[f64], num_joints: usize) -> Result<(), ActuatorError> {
    if values.len() != num_joints {
        return Err(ActuatorError::WrongLength {
            expected: num_joints,
            actual: values.len(),
        });
    }

    Ok(())
}
