//! # TM Server

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use serde::{Deserialize, Serialize};

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tm::{ControllerStateTm, JointStateTm},
};

use crate::chain_ctrl::StatusReport;

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telemetry server
pub struct TmServer {
    socket: MonitoredSocket,
}

/// Telemetry packet that is output by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TmPacket {
    pub elapsed_s: f64,

    /// `None` if the joints could not be sampled this cycle
    pub joint_state: Option<JointStateTm>,

    pub controller_state: ControllerStateTm,

    pub chain_ctrl_status_rpt: StatusReport,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TmServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send telemetry: {0}")]
    SendError(zmq::Error),

    #[error("Could not serialize the telemetry: {0}")]
    SerializationError(serde_json::Error),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TmServer {
    /// Create a new instance of the TM Server.
    ///
    /// This function will not block until a subscriber connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TmServerError> {
        // Create the socket options
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            bind: true,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            send_timeout: 10,
            ..Default::default()
        };

        // Bind the socket
        let socket = MonitoredSocket::new(ctx, zmq::PUB, socket_options, &params.tm_endpoint)
            .map_err(TmServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Publish a telemetry packet.
    pub fn send(&mut self, packet: &TmPacket) -> Result<(), TmServerError> {
        // Serialize packet
        let packet_string =
            serde_json::to_string(packet).map_err(TmServerError::SerializationError)?;

        // Send the packet
        self.socket
            .send(&packet_string, 0)
            .map_err(TmServerError::SendError)
    }
}
