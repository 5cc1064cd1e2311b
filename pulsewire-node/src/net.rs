//! Egress transmission and admin control, both driven from the single
//! sampling loop in `main`. The socket is the only shared resource the
//! node's concurrency model allows; nothing here spawns a thread.

use std::net::UdpSocket;

use pulsewire_wire::{PpgBundle, RestartCommand};

use crate::error::NodeError;

pub struct Egress {
    socket: UdpSocket,
}

impl Egress {
    pub fn connect(server_addr: &str) -> Result<Self, NodeError> {
        let socket = UdpSocket::bind("0.0.0.0:0").map_err(|source| NodeError::EgressBind {
            addr: "0.0.0.0:0".to_string(),
            source,
        })?;
        socket.connect(server_addr).map_err(|source| NodeError::EgressConnect {
            addr: server_addr.to_string(),
            source,
        })?;
        Ok(Egress { socket })
    }

    /// Send one bundle. Send failures are logged and swallowed: a single
    /// dropped bundle is not worth tearing down the sampling loop over,
    /// and the processor's own gap detection covers the rest.
    pub fn send(&self, bundle: &PpgBundle) {
        match self.socket.send(&bundle.encode()) {
            Ok(_) => {}
            Err(e) => log::debug!("egress send failed: {e}"),
        }
    }
}

pub struct AdminListener {
    socket: UdpSocket,
}

impl AdminListener {
    pub fn bind(port: u16) -> Result<Self, NodeError> {
        let addr = format!("0.0.0.0:{port}");
        let socket = UdpSocket::bind(&addr).map_err(|source| NodeError::AdminBind { addr, source })?;
        socket.set_nonblocking(true).map_err(|source| NodeError::AdminBind {
            addr: "set_nonblocking".to_string(),
            source,
        })?;
        Ok(AdminListener { socket })
    }

    /// Non-blocking poll for a `/restart` command, checked once per
    /// sampling tick. Returns `true` if a restart was requested.
    pub fn poll_restart(&self) -> bool {
        let mut buf = [0u8; 64];
        match self.socket.recv(&mut buf) {
            Ok(n) => RestartCommand::decode(&buf[..n]).is_ok(),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => false,
            Err(e) => {
                log::debug!("admin recv failed: {e}");
                false
            }
        }
    }
}
