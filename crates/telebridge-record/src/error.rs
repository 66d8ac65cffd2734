/// Errors that can occur while decoding a telemetry datagram.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// The datagram is not exactly one record long.
    #[error("datagram size mismatch ({actual} bytes, expected {expected})")]
    SizeMismatch { actual: usize, expected: usize },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
