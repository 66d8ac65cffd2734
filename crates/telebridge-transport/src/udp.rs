use std::io::ErrorKind;
use std::net::{IpAddr, SocketAddr, UdpSocket};
use std::time::Duration;

use bytes::Bytes;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Default inbound telemetry port.
pub const DEFAULT_PORT: u16 = 5678;

/// Default receive buffer size. Larger datagrams are rejected as truncated.
pub const DEFAULT_MAX_DATAGRAM: usize = 1024;

/// One datagram as delivered by the socket.
#[derive(Debug, Clone)]
pub struct Datagram {
    /// Raw datagram bytes.
    pub payload: Bytes,
    /// Address the datagram came from.
    pub sender: SocketAddr,
}

impl Datagram {
    /// Sender IP with IPv4-mapped IPv6 addresses folded back to IPv4.
    pub fn sender_ip(&self) -> IpAddr {
        canonical_ip(self.sender.ip())
    }
}

/// Fold an IPv4-mapped IPv6 address (`::ffff:a.b.c.d`) back to IPv4.
///
/// Dual-stack listeners report IPv4 nodes in mapped form; logs, rows and
/// replies all use the canonical form.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    ip.to_canonical()
}

/// Blocking UDP listener for telemetry datagrams.
///
/// IPv6 binds are dual-stack so IPv4 nodes reach the same port.
/// `SO_REUSEADDR` is set so a restarted server can rebind immediately.
pub struct DatagramListener {
    socket: UdpSocket,
    local_addr: SocketAddr,
    max_datagram: usize,
    // One byte past `max_datagram` so an oversized datagram is detectable.
    buf: Vec<u8>,
}

impl DatagramListener {
    /// Bind the telemetry port with the default receive buffer size.
    pub fn bind(addr: SocketAddr) -> Result<Self> {
        Self::bind_with_buffer(addr, DEFAULT_MAX_DATAGRAM)
    }

    /// Bind the telemetry port with an explicit receive buffer size.
    pub fn bind_with_buffer(addr: SocketAddr, max_datagram: usize) -> Result<Self> {
        let bind_err = |source| TransportError::Bind { addr, source };

        let socket = Socket::new(Domain::for_address(addr), Type::DGRAM, Some(Protocol::UDP))
            .map_err(bind_err)?;
        socket.set_reuse_address(true).map_err(bind_err)?;
        if addr.is_ipv6() {
            if let Err(err) = socket.set_only_v6(false) {
                debug!(%addr, error = %err, "dual-stack unavailable; accepting IPv6 only");
            }
        }
        socket.bind(&addr.into()).map_err(bind_err)?;

        let socket: UdpSocket = socket.into();
        let local_addr = socket.local_addr()?;

        info!(%local_addr, "listening for telemetry datagrams");

        let max_datagram = max_datagram.max(1);
        Ok(Self {
            socket,
            local_addr,
            max_datagram,
            buf: vec![0u8; max_datagram + 1],
        })
    }

    /// Receive the next datagram (blocking, or until the read timeout).
    ///
    /// A datagram longer than [`max_datagram`](Self::max_datagram) is
    /// consumed and reported as [`TransportError::Truncated`]; its cut-down
    /// payload is never returned.
    pub fn recv(&mut self) -> Result<Datagram> {
        loop {
            match self.socket.recv_from(&mut self.buf) {
                Ok((len, sender)) if len > self.max_datagram => {
                    return Err(TransportError::Truncated {
                        sender,
                        max_datagram: self.max_datagram,
                    });
                }
                Ok((len, sender)) => {
                    return Ok(Datagram {
                        payload: Bytes::copy_from_slice(&self.buf[..len]),
                        sender,
                    });
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if err.kind() == ErrorKind::WouldBlock || err.kind() == ErrorKind::TimedOut =>
                {
                    return Err(TransportError::TimedOut);
                }
                Err(err) => return Err(TransportError::Recv(err)),
            }
        }
    }

    /// Set the read timeout. `None` blocks until a datagram arrives.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Receive buffer size in bytes.
    pub fn max_datagram(&self) -> usize {
        self.max_datagram
    }
}

impl std::fmt::Debug for DatagramListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramListener")
            .field("local_addr", &self.local_addr)
            .field("max_datagram", &self.max_datagram)
            .finish()
    }
}
