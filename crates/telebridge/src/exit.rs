use std::fmt;
use std::io;

use telebridge_pipeline::StartupError;
use telebridge_record::DecodeError;
use telebridge_transport::TransportError;

pub const SUCCESS: i32 = 0;
pub const TRANSPORT_ERROR: i32 = 3;
pub const BUS_ERROR: i32 = 4;
pub const STORAGE_ERROR: i32 = 5;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    let code = match &err {
        TransportError::TimedOut => TIMEOUT,
        TransportError::Truncated { .. } => DATA_INVALID,
        TransportError::Bind { source, .. }
        | TransportError::Send { source, .. }
        | TransportError::Recv(source)
        | TransportError::Io(source) => match source.kind() {
            io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
            _ => TRANSPORT_ERROR,
        },
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn startup_error(err: StartupError) -> CliError {
    match err {
        StartupError::BindFailed(source) => transport_error("bind failed", source),
        err @ StartupError::BusConnectFailed { .. } => CliError::new(BUS_ERROR, err.to_string()),
        StartupError::StorageOpen { path, source } => match source.kind() {
            io::ErrorKind::PermissionDenied => CliError::new(
                PERMISSION_DENIED,
                format!("cannot open log {}: {source}", path.display()),
            ),
            _ => CliError::new(
                STORAGE_ERROR,
                format!("cannot open log {}: {source}", path.display()),
            ),
        },
    }
}

pub fn decode_error(context: &str, err: DecodeError) -> CliError {
    CliError::new(DATA_INVALID, format!("{context}: {err}"))
}
