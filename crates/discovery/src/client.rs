//! Broadcast probe that collects `"hostname:port"` replies.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::thread;
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, Socket, Type};

use crate::error::DiscoveryError;
use crate::{DISCOVERY_CODE, MAX_DATAGRAM_LEN};

/// Default listen window for discovery replies.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// One peer that answered a discovery beacon.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Peer {
    /// Hostname the peer advertises.
    pub hostname: String,
    /// Source address of the reply datagram.
    pub address: IpAddr,
    /// TCP service port the peer accepts transfers on.
    pub port: u16,
}

/// Broadcasts one beacon and collects replies until `timeout` passes without
/// a response.
///
/// The reply socket is bound to the adjacent port before the beacon leaves,
/// so a fast responder cannot win the race against our listener. Replies are
/// yielded in arrival order, duplicates included.
pub fn discover_peers(
    broadcast: Ipv4Addr,
    discovery_port: u16,
    timeout: Duration,
) -> Result<Vec<Peer>, DiscoveryError> {
    let listener = bind_reply_socket(discovery_port + 1, timeout)?;
    let worker = thread::Builder::new()
        .name("discovery-listener".to_owned())
        .spawn(move || collect_replies(&listener))
        .map_err(DiscoveryError::Io)?;

    send_beacon(broadcast, discovery_port)?;

    Ok(worker.join().unwrap_or_default())
}

fn bind_reply_socket(port: u16, timeout: Duration) -> Result<UdpSocket, DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::Bind)?;
    socket
        .set_reuse_address(true)
        .map_err(DiscoveryError::Bind)?;
    let bind_addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
    socket
        .bind(&SockAddr::from(bind_addr))
        .map_err(DiscoveryError::Bind)?;
    socket
        .set_read_timeout(Some(timeout))
        .map_err(DiscoveryError::Bind)?;
    Ok(socket.into())
}

fn send_beacon(broadcast: Ipv4Addr, discovery_port: u16) -> Result<(), DiscoveryError> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))
        .map_err(DiscoveryError::Broadcast)?;
    socket
        .set_broadcast(true)
        .map_err(DiscoveryError::Broadcast)?;
    let target = SocketAddr::V4(SocketAddrV4::new(broadcast, discovery_port));
    socket
        .send_to(DISCOVERY_CODE.as_bytes(), &SockAddr::from(target))
        .map_err(DiscoveryError::Broadcast)?;
    Ok(())
}

fn collect_replies(socket: &UdpSocket) -> Vec<Peer> {
    let mut peers = Vec::new();
    let mut buf = [0u8; MAX_DATAGRAM_LEN];
    loop {
        match socket.recv_from(&mut buf) {
            Ok((len, source)) => match parse_reply(&buf[..len], source.ip()) {
                Some(peer) => {
                    tracing::debug!(host = %peer.hostname, address = %peer.address, "discovery reply");
                    peers.push(peer);
                }
                None => {
                    tracing::warn!(source = %source, "malformed discovery reply");
                }
            },
            Err(error)
                if error.kind() == io::ErrorKind::WouldBlock
                    || error.kind() == io::ErrorKind::TimedOut =>
            {
                break;
            }
            // After a broadcast some stacks surface a reset on the next read.
            Err(error) if error.kind() == io::ErrorKind::ConnectionReset => {}
            Err(error) => {
                tracing::warn!(%error, "discovery listen failed");
                break;
            }
        }
    }
    peers
}

fn parse_reply(payload: &[u8], source: IpAddr) -> Option<Peer> {
    let text = std::str::from_utf8(payload).ok()?;
    let (hostname, port) = text.rsplit_once(':')?;
    let port = port.trim().parse().ok()?;
    if hostname.is_empty() {
        return None;
    }
    Some(Peer {
        hostname: hostname.to_owned(),
        address: source,
        port,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_parses_hostname_and_port() {
        let peer = parse_reply(b"workstation:1111", IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
        assert_eq!(peer.hostname, "workstation");
        assert_eq!(peer.port, 1111);
        assert_eq!(peer.address, IpAddr::V4(Ipv4Addr::LOCALHOST));
    }

    #[test]
    fn reply_splits_on_last_colon() {
        let peer = parse_reply(b"host:with:colons:2222", IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
        assert_eq!(peer.hostname, "host:with:colons");
        assert_eq!(peer.port, 2222);
    }

    #[test]
    fn malformed_replies_are_dropped() {
        let localhost = IpAddr::V4(Ipv4Addr::LOCALHOST);
        assert_eq!(parse_reply(b"", localhost), None);
        assert_eq!(parse_reply(b"no-port", localhost), None);
        assert_eq!(parse_reply(b"host:not-a-number", localhost), None);
        assert_eq!(parse_reply(b":1111", localhost), None);
        assert_eq!(parse_reply(&[0xFF, 0xFE, b':', b'1'], localhost), None);
    }
}
