//! # Camera Client
//!
//! Receives marker detections from the perception node and publishes demands to the camera's
//! pan/tilt mount.

// ------------------------------------------------------------------------------------------------
// IMPORTS
// ------------------------------------------------------------------------------------------------

use comms_if::{
    eqpt::cam::{MarkerDetections, PanTiltDems},
    net::{zmq, MonitoredSocket, MonitoredSocketError, NetError, NetParams, SocketOptions},
};

// ------------------------------------------------------------------------------------------------
// STRUCTS
// ------------------------------------------------------------------------------------------------

/// The camera client
pub struct CamClient {
    detections_socket: MonitoredSocket,

    pan_tilt_socket: MonitoredSocket,
}

// ------------------------------------------------------------------------------------------------
// ENUMS
// ------------------------------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum CamClientError {
    #[error("Socket error: {0}")]
    SocketError(#[from] MonitoredSocketError),

    #[error("Could not receive detections: {0}")]
    RecvError(NetError),

    #[error("Could not send pan/tilt demands: {0}")]
    SendError(NetError),
}

// ------------------------------------------------------------------------------------------------
// IMPLS
// ------------------------------------------------------------------------------------------------

impl CamClient {
    /// Create a new instance of the camera client
    pub fn new(ctx: &zmq::Context, params: &NetParams) -> Result<Self, CamClientError> {
        let detections_socket = MonitoredSocket::new(
            ctx,
            zmq::SUB,
            SocketOptions::subscriber(),
            &params.detections_endpoint,
        )?;

        let pan_tilt_socket = MonitoredSocket::new(
            ctx,
            zmq::PUB,
            SocketOptions::publisher(),
            &params.pan_tilt_endpoint,
        )?;

        Ok(Self {
            detections_socket,
            pan_tilt_socket,
        })
    }

    /// Get every detection event received since the last call, oldest first.
    pub fn recv_detections(&self) -> Result<Vec<MarkerDetections>, CamClientError> {
        self.detections_socket
            .drain_json()
            .map_err(CamClientError::RecvError)
    }

    /// Publish a demand to the pan/tilt mount.
    pub fn send_pan_tilt(&self, dems: &PanTiltDems) -> Result<(), CamClientError> {
        self.pan_tilt_socket
            .send_json(dems)
            .map_err(CamClientError::SendError)
    }

    /// True if the detections publisher is connected.
    pub fn connected(&self) -> bool {
        self.detections_socket.connected()
    }
}
