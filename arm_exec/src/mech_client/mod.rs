//! # Mechanisms Client
//!
//! Publishes actuator demands to the arm's driver and collects the joint feedback it publishes
//! back.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::mech::{JointStateMsg, MechDems},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetError, NetParams, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

pub struct MechClient {
    dems_socket: MonitoredSocket,

    joint_state_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(thiserror::Error, Debug)]
pub enum MechClientError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not send demands to the driver: {0}")]
    SendError(NetError),

    #[error("Could not receive joint states from the driver: {0}")]
    RecvError(NetError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl MechClient {
    /// Create a new instance of the mechanisms client.
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, MechClientError> {
        let dems_socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions::publisher(),
            &params.mech_dems_endpoint,
        )?;

        let joint_state_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            SocketOptions::subscriber(),
            &params.joint_state_endpoint,
        )?;

        Ok(Self {
            dems_socket,
            joint_state_socket,
        })
    }

    /// Publish demands to the driver. Empty demands are not sent.
    pub fn send_demands(&self, demands: &MechDems) -> Result<(), MechClientError> {
        if demands.is_empty() {
            return Ok(());
        }

        self.dems_socket
            .send_json(demands)
            .map_err(MechClientError::SendError)
    }

    /// Get every joint state message received since the last call, oldest first.
    pub fn recv_joint_states(&self) -> Result<Vec<JointStateMsg>, MechClientError> {
        self.joint_state_socket
            .drain_json()
            .map_err(MechClientError::RecvError)
    }

    /// True if the joint feedback publisher is connected.
    pub fn connected(&self) -> bool {
        self.joint_state_socket.connected()
    }
}
