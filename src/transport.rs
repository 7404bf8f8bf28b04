/// Multicast UDP sockets
///
/// `MulticastTransport` is the send side owned by one feed. `MulticastReceiver`
/// joins a group for the diagnostic receiver. Both are plain blocking
/// `std::net::UdpSocket`s; sends are fire-and-forget. Receive sockets are
/// built through `socket2` so several receivers on one host can share a port.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};
use tracing::{info, warn};

use crate::error::TransportError;

pub const DEFAULT_TTL: u32 = 1;
pub const RECV_BUFFER_SIZE: usize = 1024;
/// Requested kernel receive buffer (SO_RCVBUF)
pub const SOCKET_RECV_BUFFER: usize = 64 * 1024;

/// Destination for encoded ticks
pub trait TickSink: Send + 'static {
    /// Send one datagram, returning the number of bytes written
    fn send(&mut self, payload: &[u8]) -> io::Result<usize>;
}

#[derive(Debug)]
pub struct MulticastTransport {
    socket: UdpSocket,
    destination: SocketAddr,
}

impl MulticastTransport {
    /// Link-local sender with loopback enabled
    pub fn new(group: Ipv4Addr, port: u16) -> Result<Self, TransportError> {
        Self::with_options(group, port, DEFAULT_TTL, true)
    }

    pub fn with_options(group: Ipv4Addr, port: u16, ttl: u32, loopback: bool) -> Result<Self, TransportError> {
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0));
        let socket = UdpSocket::bind(bind_addr)
            .map_err(|source| TransportError::Bind { addr: bind_addr, source })?;

        socket
            .set_multicast_loop_v4(loopback)
            .map_err(|source| TransportError::SocketOption { option: "IP_MULTICAST_LOOP", source })?;
        socket
            .set_multicast_ttl_v4(ttl)
            .map_err(|source| TransportError::SocketOption { option: "IP_MULTICAST_TTL", source })?;

        let destination = SocketAddr::V4(SocketAddrV4::new(group, port));
        info!(%destination, ttl, loopback, "multicast sender ready");

        Ok(MulticastTransport { socket, destination })
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn socket(&self) -> &UdpSocket {
        &self.socket
    }
}

impl TickSink for MulticastTransport {
    fn send(&mut self, payload: &[u8]) -> io::Result<usize> {
        self.socket.send_to(payload, self.destination)
    }
}

#[derive(Debug)]
pub struct MulticastReceiver {
    socket: UdpSocket,
    group: SocketAddr,
}

impl MulticastReceiver {
    /// Bind the group port on all interfaces and join the group
    pub fn join(group: Ipv4Addr, port: u16, interface: Ipv4Addr) -> Result<Self, TransportError> {
        let bind_addr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port));
        let group_addr = SocketAddr::V4(SocketAddrV4::new(group, port));

        let socket = bind_shared(bind_addr)?;
        socket
            .join_multicast_v4(&group, &interface)
            .map_err(|source| TransportError::JoinGroup { group: group_addr, source })?;

        info!(group = %group_addr, %interface, "joined multicast group");
        Ok(MulticastReceiver { socket, group: group_addr })
    }

    /// Bound the time a `recv` may block so callers can poll a stop flag
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<(), TransportError> {
        self.socket
            .set_read_timeout(timeout)
            .map_err(|source| TransportError::SocketOption { option: "SO_RCVTIMEO", source })
    }

    pub fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf)
    }

    pub fn group(&self) -> SocketAddr {
        self.group
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}

/// Bind a UDP socket with SO_REUSEADDR set so other receivers may bind the same port
pub fn bind_shared(addr: SocketAddr) -> Result<UdpSocket, TransportError> {
    let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
        .map_err(TransportError::Create)?;
    socket
        .set_reuse_address(true)
        .map_err(|source| TransportError::SocketOption { option: "SO_REUSEADDR", source })?;
    if let Err(e) = socket.set_recv_buffer_size(SOCKET_RECV_BUFFER) {
        warn!(%addr, "failed to set SO_RCVBUF to {}: {}", SOCKET_RECV_BUFFER, e);
    }
    socket
        .bind(&addr.into())
        .map_err(|source| TransportError::Bind { addr, source })?;
    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_socket_options() {
        let transport = MulticastTransport::new(Ipv4Addr::new(224, 1, 1, 1), 9001).unwrap();
        assert_eq!(transport.socket().multicast_ttl_v4().unwrap(), 1);
        assert!(transport.socket().multicast_loop_v4().unwrap());
        assert_eq!(transport.destination(), "224.1.1.1:9001".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn test_shared_bind_allows_second_socket() {
        let first = bind_shared("0.0.0.0:0".parse().unwrap()).unwrap();
        let port = first.local_addr().unwrap().port();

        let second = bind_shared(SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, port))).unwrap();
        assert_eq!(second.local_addr().unwrap().port(), port);
    }

    #[test]
    fn test_two_receivers_share_group_port() {
        let group = Ipv4Addr::new(239, 255, 42, 1);
        let first = MulticastReceiver::join(group, 0, Ipv4Addr::LOCALHOST).unwrap();
        let port = first.local_addr().unwrap().port();

        let second = MulticastReceiver::join(group, port, Ipv4Addr::LOCALHOST).unwrap();
        assert_eq!(second.local_addr().unwrap().port(), port);
        assert_eq!(second.group(), SocketAddr::V4(SocketAddrV4::new(group, port)));
    }
}
