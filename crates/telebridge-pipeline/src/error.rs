use std::path::PathBuf;

use telebridge_transport::TransportError;

/// A downstream sink failed for one datagram. Never fatal.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Appending the row to the log file failed.
    #[error("storage append failed: {0}")]
    Storage(#[source] std::io::Error),

    /// Publishing to the bus failed or the bus is not connected.
    #[error("bus publish to {topic} failed: {message}")]
    Bus { topic: String, message: String },

    /// Sending the acknowledgment failed.
    #[error("acknowledgment failed: {0}")]
    Reply(#[source] TransportError),
}

/// A resource could not be acquired before the receive loop started. Fatal.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The inbound telemetry port could not be bound.
    #[error("inbound port binding failed: {0}")]
    BindFailed(#[source] TransportError),

    /// The broker could not be reached.
    #[error("bus connection to {host}:{port} failed: {message}")]
    BusConnectFailed {
        host: String,
        port: u16,
        message: String,
    },

    /// The log file could not be created.
    #[error("failed to create log file {path}: {source}")]
    StorageOpen {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, SinkError>;
