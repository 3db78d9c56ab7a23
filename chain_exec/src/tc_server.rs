//! # Telecommand Server
//!
//! Accepts telecommands from clients (such as `command_line_chain`) on a REP socket and answers
//! each one with a [`TcResponse`]. The server runs on its own thread so that requests are handled
//! while the main loop is sleeping.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use log::{info, warn};
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetParams, SocketOptions},
    tc::{Tc, TcParseError, TcResponse},
};

use crate::{controller::ChainController, tc_processor};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telecommand server
pub struct TcServer {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcServerError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("Could not send the response to the client: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a message from the client: {0}")]
    RecvError(zmq::Error),

    #[error("Could not serialize the response: {0}")]
    SerializationError(serde_json::Error),

    #[error("Could not parse the recieved telecommand: {0}")]
    TcParseError(TcParseError),

    #[error("The client sent a message which was not valid UTF-8")]
    NonUtf8Tc,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcServer {
    /// Create a new instance of the TC Server, bound to the telecommand endpoint.
    ///
    /// This function will not block until a client connects.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, TcServerError> {
        // Create the socket options
        let socket_options = SocketOptions {
            bind: true,
            block_on_first_connect: false,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 100,
            send_timeout: 10,
            ..Default::default()
        };

        // Bind the socket
        let socket = MonitoredSocket::new(ctx, zmq::REP, socket_options, &params.tc_endpoint)
            .map_err(TcServerError::SocketError)?;

        Ok(Self { socket })
    }

    /// Recieve a single TC from a client.
    ///
    /// `Ok(None)` is returned if no TC arrived within the receive timeout. After recieving a
    /// valid TC the server must send a response using `.send_response()` before attempting to
    /// recieve another TC. If the TC could not be parsed the `Invalid` response is sent by this
    /// function.
    pub fn recieve_tc(&self) -> Result<Option<Tc>, TcServerError> {
        // Attempt to read a string from the socket
        let tc_str = match self.socket.recv_string(0) {
            // Valid message
            Ok(Ok(s)) => s,
            // Non UTF-8 message
            Ok(Err(_)) => {
                self.send_response(&TcResponse::Invalid)?;
                return Err(TcServerError::NonUtf8Tc);
            }
            // No message in timeout
            Err(zmq::Error::EAGAIN) => return Ok(None),
            // No response is sent if we could not recieve
            Err(e) => return Err(TcServerError::RecvError(e)),
        };

        match Tc::from_json(&tc_str) {
            Ok(tc) => Ok(Some(tc)),
            Err(e) => {
                self.send_response(&TcResponse::Invalid)?;
                Err(TcServerError::TcParseError(e))
            }
        }
    }

    /// Send the given response back to the client.
    pub fn send_response(&self, response: &TcResponse) -> Result<(), TcServerError> {
        // Serialise the response
        let response_str =
            serde_json::to_string(response).map_err(TcServerError::SerializationError)?;

        // Send the response
        self.socket
            .send(&response_str, 0)
            .map_err(TcServerError::SendError)
    }

    /// Serve telecommands until `shutdown` is raised.
    pub fn run(self, controller: Arc<ChainController>, shutdown: Arc<AtomicBool>) {
        info!("TcServer running");

        while !shutdown.load(Ordering::Relaxed) {
            let tc = match self.recieve_tc() {
                Ok(Some(tc)) => tc,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Could not recieve TC: {}", e);
                    continue;
                }
            };

            let response = tc_processor::exec(&controller, tc);

            if let Err(e) = self.send_response(&response) {
                warn!("Could not respond to TC: {}", e);
            }
        }

        info!("TcServer stopped");
    }
}
