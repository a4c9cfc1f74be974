//! Socket probes used by hosts before they open or advertise a connection.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, UdpSocket};

use tracing::debug;

/// IP address family selector for [`local_address`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressFamily {
    V4,
    V6,
}

/// Returns true if a TCP listener could bind `port` on all IPv4 interfaces.
///
/// Port 0 is never reported available: it names "any port", not a specific one.
pub fn is_port_available(port: u16) -> bool {
    if port == 0 {
        return false;
    }
    match TcpListener::bind((Ipv4Addr::UNSPECIFIED, port)) {
        Ok(_) => true,
        Err(err) => {
            debug!(port, error = %err, "port unavailable");
            false
        }
    }
}

/// The local address this host would use for outbound traffic of `family`.
///
/// Uses an unconnected-then-connected UDP socket toward a documentation
/// address; no packet is sent. Returns `None` when no route exists.
pub fn local_address(family: AddressFamily) -> Option<IpAddr> {
    let (bind, target): (SocketAddr, SocketAddr) = match family {
        AddressFamily::V4 => (
            (Ipv4Addr::UNSPECIFIED, 0).into(),
            (Ipv4Addr::new(192, 0, 2, 1), 9).into(),
        ),
        AddressFamily::V6 => (
            (Ipv6Addr::UNSPECIFIED, 0).into(),
            (Ipv6Addr::new(0x2001, 0xdb8, 0, 0, 0, 0, 0, 1), 9).into(),
        ),
    };

    let socket = UdpSocket::bind(bind).ok()?;
    socket.connect(target).ok()?;
    let ip = socket.local_addr().ok()?.ip();
    if ip.is_unspecified() {
        None
    } else {
        Some(ip)
    }
}
