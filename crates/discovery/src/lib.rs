#![deny(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(missing_docs)]

//! # Overview
//!
//! `discovery` lets peers on one broadcast domain find each other. A probing
//! peer broadcasts a fixed magic code to the discovery port; every listening
//! peer answers `"<hostname>:<service-port>"` to the sender's address on the
//! adjacent port. The code is a shared password in the loosest sense, not a
//! security boundary.
//!
//! # Design
//!
//! - [`netinfo`] resolves the default-route interface's IPv4 address and
//!   netmask and derives the broadcast address (`ip | !mask`).
//! - [`client`] binds the reply port *before* broadcasting so no response can
//!   be lost to a race, then collects replies on a worker until the listen
//!   window times out. Duplicate replies are passed through; deduplication is
//!   the caller's concern.
//! - [`server`] answers beacons for the process lifetime. Connection resets
//!   are ignored silently (a UDP quirk after broadcasts on some platforms);
//!   any other receive error is logged and the loop continues.

pub mod client;
pub mod netinfo;
pub mod server;

mod error;

pub use client::{DEFAULT_TIMEOUT, Peer, discover_peers};
pub use error::DiscoveryError;
pub use netinfo::{NetInfo, broadcast_address, probe};
pub use server::DiscoveryServer;

/// UDP port beacons are sent to; replies arrive on the adjacent port.
pub const DISCOVERY_PORT: u16 = 50505;

/// Magic code carried by a discovery beacon.
pub const DISCOVERY_CODE: &str = "COPYNINJA_DISCOVERY";

/// Largest datagram either side will read.
pub(crate) const MAX_DATAGRAM_LEN: usize = 1024;
