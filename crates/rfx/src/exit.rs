use std::fmt;
use std::io;

use rfx_transport::TransportError;

// Exit code constants. A finished session — even one ended by a transport
// failure — is SUCCESS; only startup problems produce a nonzero code.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const PERMISSION_DENIED: i32 = 50;
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
        io::ErrorKind::AddrInUse | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. }
        | TransportError::Connect { source, .. }
        | TransportError::Accept(source)
        | TransportError::Io(source) => io_error(context, source),
    }
}
