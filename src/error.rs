/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Error as IoError;

/// The error type for accept-path operations
///
/// Blocking waits distinguish a requested shutdown from an actual socket
/// failure: the former ends the accept loop cleanly, the latter is logged
/// and retried. Plain I/O layers keep returning
/// [`std::io::Error`](std::io::Error) and convert on the way up via
/// `From<io::Error>`.
#[derive(Debug)]
pub enum EchoError {
    /// The operation was aborted because a shutdown has been requested.
    Shutdown,
    /// The underlying socket operation failed.
    Failed(IoError),
}

impl From<IoError> for EchoError {
    fn from(error: IoError) -> Self {
        Self::Failed(error)
    }
}

impl Display for EchoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Shutdown => write!(f, "operation aborted by shutdown request"),
            Self::Failed(error) => write!(f, "socket operation failed: {}", error),
        }
    }
}

impl Error for EchoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Shutdown => None,
            Self::Failed(error) => Some(error),
        }
    }
}
