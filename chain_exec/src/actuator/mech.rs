//! # Mechanisms actuator chain
//!
//! Forwards every actuator chain call to the mechanisms server, which owns the CAN connection to
//! the physical modules.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{trace, warn};

use comms_if::{
    eqpt::chain::{ChainDems, ChainDemsResponse, ChainParams},
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
};

use super::{check_len, ActuatorChain, ActuatorError};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Actuator chain reached through the mechanisms server.
pub struct MechChain {
    dems_socket: MonitoredSocket,

    /// Number of joints, known once the chain is initialised
    num_joints: Option<usize>,

    last_error: Option<String>,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MechChainError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send demands to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the server: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the data: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not deserialize the response from the server: {0}")]
    DeserializeError(serde_json::Error),

    #[error("The server sent a response which does not answer the demand: {0:?}")]
    UnexpectedResponse(ChainDemsResponse),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MechChain {
    /// Create a new client connected to the mechanisms server demands endpoint.
    ///
    /// This function will not block until the server connects.
    pub fn new(ctx: &zmq::Context, demands_endpoint: &str) -> Result<Self, MechChainError> {
        // Create the socket options
        let dems_socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 50,
            send_timeout: 10,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        // Create the socket
        let dems_socket = MonitoredSocket::new(
            ctx,
            zmq::REQ,
            dems_socket_options,
            demands_endpoint,
        )
        .map_err(MechChainError::SocketError)?;

        Ok(Self {
            dems_socket,
            num_joints: None,
            last_error: None,
        })
    }

    /// Send demands to the server and wait for its response.
    fn send_demands(&mut self, demands: &ChainDems) -> Result<ChainDemsResponse, MechChainError> {
        // If not connected return now
        if !self.dems_socket.connected() {
            return Err(MechChainError::NotConnected);
        }

        // Serialize the demands
        let dems_str =
            serde_json::to_string(demands).map_err(MechChainError::SerializationError)?;

        // Send the demands to the server
        self.dems_socket
            .send(&dems_str, 0)
            .map_err(MechChainError::SendError)?;

        // Recieve response back from the server
        let msg = self
            .dems_socket
            .recv_msg(0)
            .map_err(MechChainError::RecvError)?;

        serde_json::from_str(msg.as_str().unwrap_or("")).map_err(MechChainError::DeserializeError)
    }

    /// Send demands and convert any failure into an [`ActuatorError`].
    fn request(&mut self, demands: &ChainDems) -> Result<ChainDemsResponse, ActuatorError> {
        trace!("MechChain sending {:?}", demands);

        match self.send_demands(demands) {
            Ok(ChainDemsResponse::Error(msg)) => {
                warn!("Mechanisms server reported an error: {}", msg);
                self.last_error = Some(msg.clone());
                Err(ActuatorError::Fault(msg))
            }
            Ok(r) => Ok(r),
            Err(e) => {
                let msg = e.to_string();
                self.last_error = Some(msg.clone());
                Err(ActuatorError::Comms(msg))
            }
        }
    }

    /// Send a command which the server acknowledges with [`ChainDemsResponse::Ok`].
    fn command(&mut self, demands: &ChainDems) -> Result<(), ActuatorError> {
        match self.request(demands)? {
            ChainDemsResponse::Ok => Ok(()),
            r => Err(self.unexpected(r)),
        }
    }

    /// Request the chain status, returning `(moving, positions, velocities)`.
    fn status(&mut self) -> Result<(bool, Vec<f64>, Vec<f64>), ActuatorError> {
        let num_joints = self.num_joints()?;

        match self.request(&ChainDems::GetStatus)? {
            ChainDemsResponse::Status {
                moving,
                positions,
                velocities,
            } => {
                check_len(&positions, num_joints)?;
                check_len(&velocities, num_joints)?;
                Ok((moving, positions, velocities))
            }
            r => Err(self.unexpected(r)),
        }
    }

    fn num_joints(&self) -> Result<usize, ActuatorError> {
        self.num_joints.ok_or(ActuatorError::NotInitialised)
    }

    fn unexpected(&mut self, response: ChainDemsResponse) -> ActuatorError {
        let msg = MechChainError::UnexpectedResponse(response).to_string();
        self.last_error = Some(msg.clone());
        ActuatorError::Comms(msg)
    }
}

impl ActuatorChain for MechChain {
    fn init(&mut self, params: &ChainParams) -> Result<(), ActuatorError> {
        self.command(&ChainDems::Init(params.clone()))?;
        self.num_joints = Some(params.num_joints());
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ActuatorError> {
        self.command(&ChainDems::Stop)
    }

    fn move_to_positions(&mut self, positions_rad: &[f64]) -> Result<(), ActuatorError> {
        check_len(positions_rad, self.num_joints()?)?;
        self.command(&ChainDems::MoveToPositions(positions_rad.to_vec()))
    }

    fn move_at_velocities(&mut self, velocities_rads: &[f64]) -> Result<(), ActuatorError> {
        check_len(velocities_rads, self.num_joints()?)?;
        self.command(&ChainDems::MoveAtVelocities(velocities_rads.to_vec()))
    }

    fn is_moving(&mut self) -> Result<bool, ActuatorError> {
        self.status().map(|(moving, _, _)| moving)
    }

    fn current_positions(&mut self) -> Result<Vec<f64>, ActuatorError> {
        self.status().map(|(_, positions, _)| positions)
    }

    fn current_velocities(&mut self) -> Result<Vec<f64>, ActuatorError> {
        self.status().map(|(_, _, velocities)| velocities)
    }

    fn sample(&mut self) -> Result<(Vec<f64>, Vec<f64>), ActuatorError> {
        self.status().map(|(_, positions, velocities)| (positions, velocities))
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }
}

// ------------------------------------------------------------------------------------------------
// TESTS
// ------------------------------------------------------------------------------------------------
