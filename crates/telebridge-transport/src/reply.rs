use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, UdpSocket};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::udp::canonical_ip;

/// Default port nodes listen on for the acknowledgment.
pub const DEFAULT_ACK_PORT: u16 = 8765;

/// Fixed greeting sent back to a node after each accepted record.
pub const ACK_PAYLOAD: &[u8] = b"Hello from the server";

/// Sends the acknowledgment datagram to a node.
///
/// Each send opens its own socket and closes it before returning, whether or
/// not the send succeeded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplySender {
    port: u16,
}

impl ReplySender {
    /// Reply sender targeting `port` on each node.
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    /// Destination port on the node.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Send the acknowledgment to `ip` on the configured port.
    pub fn send_ack(&self, ip: IpAddr) -> Result<()> {
        let target = SocketAddr::new(canonical_ip(ip), self.port);
        let local = match target {
            SocketAddr::V4(_) => SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            SocketAddr::V6(_) => SocketAddr::from((Ipv6Addr::UNSPECIFIED, 0)),
        };

        let socket = UdpSocket::bind(local).map_err(|source| TransportError::Bind {
            addr: local,
            source,
        })?;

        debug!(%target, "sending acknowledgment");
        let sent = socket
            .send_to(ACK_PAYLOAD, target)
            .map_err(|source| TransportError::Send {
                addr: target,
                source,
            })?;

        if sent != ACK_PAYLOAD.len() {
            return Err(TransportError::Send {
                addr: target,
                source: std::io::Error::new(
                    std::io::ErrorKind::WriteZero,
                    format!("short datagram write ({sent} of {} bytes)", ACK_PAYLOAD.len()),
                ),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ack_listener() -> UdpSocket {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_secs(2)))
            .unwrap();
        socket
    }

    #[test]
    fn test_send_ack_delivers_greeting() {
        let listener = ack_listener();
        let port = listener.local_addr().unwrap().port();

        let sender = ReplySender::new(port);
        sender.send_ack(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], b"Hello from the server");
    }

    #[test]
    fn test_send_ack_to_mapped_address() {
        let listener = ack_listener();
        let port = listener.local_addr().unwrap().port();

        let mapped = IpAddr::V6(Ipv4Addr::LOCALHOST.to_ipv6_mapped());
        ReplySender::new(port).send_ack(mapped).unwrap();

        let mut buf = [0u8; 64];
        let (len, _) = listener.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], ACK_PAYLOAD);
    }

    #[test]
    fn test_repeated_sends_each_deliver() {
        let listener = ack_listener();
        let port = listener.local_addr().unwrap().port();
        let sender = ReplySender::new(port);

        for _ in 0..3 {
            sender.send_ack(IpAddr::V4(Ipv4Addr::LOCALHOST)).unwrap();
            let mut buf = [0u8; 64];
            let (len, _) = listener.recv_from(&mut buf).unwrap();
            assert_eq!(&buf[..len], ACK_PAYLOAD);
        }
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_send_ack_reports_send_failure() {
        // Broadcast without SO_BROADCAST is refused by the kernel.
        let sender = ReplySender::new(DEFAULT_ACK_PORT);
        let result = sender.send_ack(IpAddr::V4(Ipv4Addr::BROADCAST));
        assert!(matches!(result, Err(TransportError::Send { .. })));
    }
}
