//! Resolves the local address, netmask, and broadcast address of the
//! interface that carries the default IPv4 route.

use std::net::{IpAddr, Ipv4Addr, UdpSocket};

use crate::error::DiscoveryError;

/// Address and netmask of the primary interface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NetInfo {
    /// The interface's IPv4 address.
    pub address: Ipv4Addr,
    /// The interface's subnet mask.
    pub netmask: Ipv4Addr,
}

impl NetInfo {
    /// Returns the directed broadcast address for this interface.
    #[must_use]
    pub fn broadcast(&self) -> Ipv4Addr {
        broadcast_address(self.address, self.netmask)
    }
}

/// Computes `address | !netmask` as an unsigned 32-bit value.
#[must_use]
pub fn broadcast_address(address: Ipv4Addr, netmask: Ipv4Addr) -> Ipv4Addr {
    Ipv4Addr::from(u32::from(address) | !u32::from(netmask))
}

/// Probes the interface associated with the default IPv4 route.
///
/// The address comes from a connected UDP socket (`connect` on a datagram
/// socket selects a route without sending anything); the netmask comes from
/// the interface table. Fails with [`DiscoveryError::NoDefaultRoute`] when no
/// route to a public address exists.
pub fn probe() -> Result<NetInfo, DiscoveryError> {
    let address = default_route_address()?;
    let netmask = interface_netmask(address)?;
    Ok(NetInfo { address, netmask })
}

fn default_route_address() -> Result<Ipv4Addr, DiscoveryError> {
    let socket = UdpSocket::bind(("0.0.0.0", 0)).map_err(DiscoveryError::Bind)?;
    socket
        .connect(("8.8.8.8", 53))
        .map_err(|_| DiscoveryError::NoDefaultRoute)?;
    match socket.local_addr() {
        Ok(addr) => match addr.ip() {
            IpAddr::V4(ip) => Ok(ip),
            IpAddr::V6(_) => Err(DiscoveryError::NoDefaultRoute),
        },
        Err(error) => Err(DiscoveryError::AddressResolution(error)),
    }
}

#[cfg(unix)]
fn interface_netmask(address: Ipv4Addr) -> Result<Ipv4Addr, DiscoveryError> {
    let interfaces = nix::ifaddrs::getifaddrs()
        .map_err(|errno| DiscoveryError::AddressResolution(errno.into()))?;

    for interface in interfaces {
        let (Some(ifa_address), Some(ifa_netmask)) = (interface.address, interface.netmask) else {
            continue;
        };
        let (Some(candidate), Some(netmask)) =
            (ifa_address.as_sockaddr_in(), ifa_netmask.as_sockaddr_in())
        else {
            continue;
        };
        if candidate.ip() == address {
            return Ok(netmask.ip());
        }
    }

    Err(DiscoveryError::NoDefaultRoute)
}

// Without an interface table the limited broadcast address still reaches the
// local segment.
#[cfg(not(unix))]
fn interface_netmask(_address: Ipv4Addr) -> Result<Ipv4Addr, DiscoveryError> {
    Ok(Ipv4Addr::UNSPECIFIED)
}
