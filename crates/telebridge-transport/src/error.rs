use std::net::SocketAddr;

/// Errors that can occur in UDP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to bind to the specified address.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to send a datagram.
    #[error("failed to send to {addr}: {source}")]
    Send {
        addr: SocketAddr,
        source: std::io::Error,
    },

    /// Failed to receive a datagram.
    #[error("failed to receive datagram: {0}")]
    Recv(std::io::Error),

    /// The datagram was larger than the receive buffer and was cut short.
    #[error("datagram from {sender} exceeds {max_datagram} bytes")]
    Truncated {
        sender: SocketAddr,
        max_datagram: usize,
    },

    /// No datagram arrived within the read timeout.
    #[error("receive timed out")]
    TimedOut,

    /// An I/O error occurred on the socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
