//! # Telecommand Client
//!
//! Sends telecommands to the chain executable's TC server and waits for the response.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    net::{zmq, MonitoredSocket, MonitoredSocketError, SocketOptions},
    tc::{Tc, TcParseError, TcResponse},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// Telecommand client
pub struct TcClient {
    socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum TcClientError {
    #[error("Socket error: {0}")]
    SocketError(MonitoredSocketError),

    #[error("The client is not connected to the server")]
    NotConnected,

    #[error("Could not send the telecommand to the server: {0}")]
    SendError(zmq::Error),

    #[error("Could not recieve a response from the server: {0}")]
    RecvError(zmq::Error),

    #[error("No response from the server")]
    NoResponse,

    #[error("Could not serialize the telecommand: {0}")]
    SerializationError(TcParseError),

    #[error("Could not parse the server's response: {0}")]
    ResponseParseError(serde_json::Error),

    #[error("The server sent a message which was not valid UTF-8")]
    NonUtf8Response,
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl TcClient {
    /// Create a new instance of the TC Client connected to the given endpoint.
    ///
    /// This function will not block until the server connects.
    pub fn new(ctx: &zmq::Context, endpoint: &str) -> Result<Self, TcClientError> {
        // Create the socket options
        let socket_options = SocketOptions {
            block_on_first_connect: false,
            connect_timeout: 1000,
            heartbeat_ivl: 500,
            heartbeat_ttl: 1000,
            heartbeat_timeout: 1000,
            linger: 1,
            recv_timeout: 2000,
            send_timeout: 100,
            req_correlate: true,
            req_relaxed: true,
            ..Default::default()
        };

        // Connect the socket
        let socket = MonitoredSocket::new(ctx, zmq::REQ, socket_options, endpoint)
            .map_err(TcClientError::SocketError)?;

        Ok(Self { socket })
    }

    /// Check if the client is connected to the server
    pub fn is_connected(&self) -> bool {
        self.socket.connected()
    }

    /// Send a telecommand and wait for the server's response.
    pub fn send(&self, tc: &Tc) -> Result<TcResponse, TcClientError> {
        if !self.socket.connected() {
            return Err(TcClientError::NotConnected);
        }

        let tc_str = tc.to_json().map_err(TcClientError::SerializationError)?;

        self.socket
            .send(&tc_str, 0)
            .map_err(TcClientError::SendError)?;

        let response_str = match self.socket.recv_string(0) {
            Ok(Ok(s)) => s,
            Ok(Err(_)) => return Err(TcClientError::NonUtf8Response),
            Err(zmq::Error::EAGAIN) => return Err(TcClientError::NoResponse),
            Err(e) => return Err(TcClientError::RecvError(e)),
        };

        serde_json::from_str(&response_str).map_err(TcClientError::ResponseParseError)
    }
}
