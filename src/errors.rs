//! Error mapping guide:
//! - Library and command operations return `IecsError`; anyhow stays in the process helpers.
//! - A missing external binary maps to exit code 127, other pre-flight refusals to 2,
//!   operator cancellation to 130 and child failures to the child's own code; all else is 1.
//! - Display strings are user-facing and asserted by tests; keep them stable.
use std::fmt;
use std::io;

#[derive(Debug)]
pub enum IecsError {
    /// A listing or describe call returned nothing for the given scope.
    NotFound(String),
    /// The operator aborted a prompt or the run was cancelled.
    Cancelled,
    /// The orchestrator rejected a request or the network failed.
    Remote(String),
    /// The live-tail stream ended without an error.
    StreamClosed,
    /// The live-tail stream yielded an event this tool does not understand.
    UnknownEvent(String),
    /// Checks that run before any network I/O.
    PreFlight(PreFlight),
    /// The session broker could not be started or exited unsuccessfully.
    Child { message: String, code: Option<i32> },
    Io(io::Error),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreFlight {
    MissingBinary(String),
    Invalid(String),
}

impl IecsError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        IecsError::NotFound(msg.into())
    }

    pub fn remote(msg: impl Into<String>) -> Self {
        IecsError::Remote(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        IecsError::PreFlight(PreFlight::Invalid(msg.into()))
    }

    pub fn missing_binary(msg: impl Into<String>) -> Self {
        IecsError::PreFlight(PreFlight::MissingBinary(msg.into()))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, IecsError::Cancelled)
    }
}

impl fmt::Display for IecsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IecsError::NotFound(msg) => f.write_str(msg),
            IecsError::Cancelled => f.write_str("cancelled by user"),
            IecsError::Remote(msg) => f.write_str(msg),
            IecsError::StreamClosed => f.write_str("stream is closed"),
            IecsError::UnknownEvent(kind) => write!(f, "unknown event type: {kind}"),
            IecsError::PreFlight(PreFlight::MissingBinary(msg))
            | IecsError::PreFlight(PreFlight::Invalid(msg)) => f.write_str(msg),
            IecsError::Child { message, .. } => f.write_str(message),
            IecsError::Io(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for IecsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            IecsError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for IecsError {
    fn from(e: io::Error) -> Self {
        IecsError::Io(e)
    }
}

impl From<serde_json::Error> for IecsError {
    fn from(e: serde_json::Error) -> Self {
        IecsError::Io(io::Error::other(e))
    }
}

/// Map an io::Error to a process exit code:
/// - 127 for NotFound (command not found)
/// - 1 for all other errors
pub fn exit_code_for_io_error(e: &io::Error) -> u8 {
    if e.kind() == io::ErrorKind::NotFound {
        127
    } else {
        1
    }
}

pub fn exit_code_for_error(e: &IecsError) -> u8 {
    match e {
        IecsError::PreFlight(PreFlight::MissingBinary(_)) => 127,
        IecsError::PreFlight(PreFlight::Invalid(_)) => 2,
        IecsError::Cancelled => 130,
        IecsError::Child { code: Some(c), .. } => (*c & 0xff) as u8,
        IecsError::Io(ioe) => exit_code_for_io_error(ioe),
        _ => 1,
    }
}
