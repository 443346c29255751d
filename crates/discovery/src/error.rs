use std::io;

use thiserror::Error;

/// Errors raised by the discovery exchange.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// No interface carries a default IPv4 route.
    #[error("no default IPv4 route")]
    NoDefaultRoute,
    /// Interface addresses could not be enumerated.
    #[error("could not resolve interface addresses: {0}")]
    AddressResolution(#[source] io::Error),
    /// The discovery socket could not be created or bound.
    #[error("could not bind discovery socket: {0}")]
    Bind(#[source] io::Error),
    /// The beacon datagram could not be sent.
    #[error("broadcast send failed: {0}")]
    Broadcast(#[source] io::Error),
    /// Any other socket failure.
    #[error("socket error: {0}")]
    Io(
        #[from]
        #[source]
        io::Error,
    ),
}
