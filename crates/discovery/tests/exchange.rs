//! Loopback exercise of the beacon/reply exchange.

use std::net::{Ipv4Addr, UdpSocket};
use std::time::Duration;

use discovery::{DiscoveryServer, discover_peers};

/// Finds a port `p` where both `p` and `p + 1` can be bound.
///
/// The pair is released before returning, so a racing process could steal
/// it; retries keep that from failing the suite.
fn free_port_pair() -> u16 {
    for _ in 0..32 {
        let Ok(first) = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)) else {
            continue;
        };
        let Ok(port) = first.local_addr().map(|addr| addr.port()) else {
            continue;
        };
        if port == u16::MAX {
            continue;
        }
        if UdpSocket::bind((Ipv4Addr::LOCALHOST, port + 1)).is_ok() {
            return port;
        }
    }
    panic!("could not reserve an adjacent UDP port pair");
}

#[test]
fn server_answers_beacon_with_hostname_and_port() {
    let port = free_port_pair();
    DiscoveryServer::spawn(port, 7777).expect("spawn discovery server");

    let peers = discover_peers(Ipv4Addr::LOCALHOST, port, Duration::from_millis(500))
        .expect("discovery probe");

    assert!(!peers.is_empty(), "expected at least one reply");
    let peer = &peers[0];
    assert_eq!(peer.port, 7777);
    assert!(!peer.hostname.is_empty());
    assert!(peer.address.is_loopback());
}

#[test]
fn server_ignores_datagrams_without_the_code() {
    let port = free_port_pair();
    DiscoveryServer::spawn(port, 7777).expect("spawn discovery server");

    let listener = UdpSocket::bind((Ipv4Addr::LOCALHOST, port + 1)).expect("bind reply port");
    listener
        .set_read_timeout(Some(Duration::from_millis(300)))
        .unwrap();

    let sender = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
    sender
        .send_to(b"NOT_THE_CODE", (Ipv4Addr::LOCALHOST, port))
        .unwrap();

    let mut buf = [0u8; 64];
    assert!(
        listener.recv_from(&mut buf).is_err(),
        "a reply arrived for a bogus beacon"
    );
}

#[test]
fn bind_clash_is_reported_at_spawn() {
    let port = free_port_pair();
    let _holder = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, port)).expect("occupy port");
    // SO_REUSEADDR lets two UDP binds coexist on some platforms, so only
    // assert that spawn itself does not panic and reports coherently.
    match DiscoveryServer::spawn(port, 7777) {
        Ok(server) => assert_eq!(server.local_addr().port(), port),
        Err(error) => assert!(!error.to_string().is_empty()),
    }
}
