/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */

//! The two accept loops.
//!
//! Both loops run until a shutdown is requested. Accept failures other than
//! a requested shutdown are logged and accepting continues; nothing below
//! the accept loop terminates the server.

use std::fmt::{Display, Formatter};

use log::{info, warn};

use crate::echo;
use crate::error::EchoError;
use crate::reactor::Reactor;
use crate::supervisor::Supervisor;
use crate::Listener;

/// Connection-concurrency model of the server.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// One client at a time: accept, echo to completion, accept the next.
    /// A stalled client blocks all subsequent clients.
    Sequential,
    /// One worker thread per client; a stalled client only occupies its
    /// own worker.
    Threaded,
}

impl Display for Mode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sequential => write!(f, "sequential"),
            Self::Threaded => write!(f, "thread-per-connection"),
        }
    }
}

pub fn run(listener: &Listener, mode: Mode) -> Result<(), EchoError> {
    match mode {
        Mode::Sequential => serve_sequential(listener),
        Mode::Threaded => serve_threaded(listener),
    }
}

/// Serves clients strictly one after another on the calling thread.
///
/// The inline handler polls on its own reactor, so a shutdown request never
/// aborts an echo in progress; it takes effect when the loop next accepts.
pub fn serve_sequential(listener: &Listener) -> Result<(), EchoError> {
    let service = Reactor::new()?;

    loop {
        match listener.accept() {
            Ok(connection) => {
                info!("client connected: {}", connection.peer_addr());
                echo::serve_client(&service, connection);
            },
            Err(EchoError::Shutdown) => break,
            Err(EchoError::Failed(error)) => warn!("accept failed: {}", error),
        }
    }

    info!("shutdown requested, no longer accepting connections");
    Ok(())
}

/// Serves each client on its own worker thread.
///
/// The accept loop only ever accepts and dispatches; echo traffic never
/// delays it. On shutdown, dispatched connections run to completion before
/// this function returns.
pub fn serve_threaded(listener: &Listener) -> Result<(), EchoError> {
    let mut supervisor = Supervisor::new()?;

    loop {
        match listener.accept() {
            Ok(connection) => {
                let peer = connection.peer_addr();
                info!("client connected: {}", peer);
                if let Err(error) = supervisor.dispatch(connection) {
                    warn!("failed to spawn worker for {}: {}", peer, error);
                }
            },
            Err(EchoError::Shutdown) => break,
            Err(EchoError::Failed(error)) => warn!("accept failed: {}", error),
        }
    }

    info!("shutdown requested, no longer accepting connections");
    supervisor.shutdown();
    Ok(())
}
