//! Outbound feature transmitter
//!
//! Sends one packed [`FeatureFrame`] datagram per analysis frame. UDP is
//! best-effort on purpose: the consumer wants the latest state, not a
//! reliable history, so send failures are dropped silently and the
//! assembler never blocks on the network.

use std::net::{SocketAddr, UdpSocket};

use crate::error::EngineError;
use crate::protocol::FeatureFrame;

/// Non-blocking UDP sender for feature frames
#[derive(Debug)]
pub struct FeatureTransmitter {
    socket: UdpSocket,
    dest: SocketAddr,
}

impl FeatureTransmitter {
    /// Bind an ephemeral local socket aimed at `dest`
    ///
    /// # Errors
    ///
    /// Returns `EngineError::Io` when the socket cannot be created; this is
    /// fatal at init time.
    pub fn new(dest: SocketAddr) -> Result<Self, EngineError> {
        let bind_addr: SocketAddr = if dest.is_ipv4() {
            "0.0.0.0:0".parse().expect("static addr")
        } else {
            "[::]:0".parse().expect("static addr")
        };
        let socket = UdpSocket::bind(bind_addr)?;
        socket.set_nonblocking(true)?;
        Ok(Self { socket, dest })
    }

    /// Send one frame; failures are logged at trace level and dropped
    pub fn send(&self, frame: &FeatureFrame) {
        if let Err(err) = self.socket.send_to(&frame.pack(), self.dest) {
            log::trace!("feature send dropped: {}", err);
        }
    }
}
