//! Long-lived responder that answers discovery beacons.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, UdpSocket};
use std::thread;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::DiscoveryError;
use crate::{DISCOVERY_CODE, MAX_DATAGRAM_LEN};

/// Handle to the background discovery responder.
///
/// The worker runs for the process lifetime; dropping the handle does not
/// stop it.
#[derive(Debug)]
pub struct DiscoveryServer {
    local_addr: SocketAddr,
}

impl DiscoveryServer {
    /// Binds the discovery port and starts answering beacons with
    /// `"<hostname>:<advertised_port>"`.
    ///
    /// Binding happens on the caller's thread so a port clash surfaces as an
    /// error instead of a dead worker.
    pub fn spawn(discovery_port: u16, advertised_port: u16) -> Result<Self, DiscoveryError> {
        let socket = bind_discovery_socket(discovery_port)?;
        let local_addr = socket.local_addr().map_err(DiscoveryError::Bind)?;
        let hostname = local_hostname();

        thread::Builder::new()
            .name("discovery-server".to_owned())
            .spawn(move || answer_beacons(&socket, &hostname, advertised_port))
            .map_err(DiscoveryError::Io)?;

        Ok(Self { local_addr })
    }

    /// The address the responder listens on.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

fn bind_discovery_socket(port: u16) -> Result<UdpSocket, DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::Bind)?;
    socket
        .set_reuse_address(true)
        .map_err(DiscoveryError::Bind)?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket
        .bind(&SockAddr::from(bind_addr))
        .map_err(DiscoveryError::Bind)?;
    Ok(socket.into())
}

fn answer_beacons(socket: &UdpSocket, hostname: &str, advertised_port: u16) {
    let reply = format!("{hostname}:{advertised_port}");
    let reply_port = socket
        .local_addr()
        .map(|addr| addr.port().wrapping_add(1))
        .unwrap_or_default();
    let mut buf = [0u8; MAX_DATAGRAM_LEN];

    loop {
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => {
                if &buf[..len] != DISCOVERY_CODE.as_bytes() {
                    tracing::debug!(source = %source, "ignoring datagram without magic code");
                    continue;
                }
                match socket.send_to(reply.as_bytes(), (source.ip(), reply_port)) {
                    Ok(_) => tracing::debug!(source = %source, "answered discovery beacon"),
                    Err(error) => tracing::warn!(%error, source = %source, "discovery reply failed"),
                }
            }
            // Normal aftermath of a broadcast on some stacks.
            Err(error) if error.kind() == io::ErrorKind::ConnectionReset => {}
            Err(error) => {
                tracing::warn!(%error, "discovery receive failed");
            }
        }
    }
}

fn local_hostname() -> String {
    dns_lookup::get_hostname().unwrap_or_else(|_| "unknown-host".to_owned())
}
