//! UDP transport for sensor node telemetry.
//!
//! Two halves:
//! - [`DatagramListener`] binds the inbound telemetry port and yields
//!   `(payload, sender)` pairs one at a time.
//! - [`ReplySender`] sends the fixed acknowledgment datagram back to a node
//!   over a short-lived socket.

pub mod error;
pub mod reply;
pub mod udp;

pub use error::{Result, TransportError};
pub use reply::{ReplySender, ACK_PAYLOAD, DEFAULT_ACK_PORT};
pub use udp::{canonical_ip, Datagram, DatagramListener, DEFAULT_MAX_DATAGRAM, DEFAULT_PORT};
