/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */
use std::io::Result as IoResult;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mio::Waker;

use log::error;

/// One-way cancellation flag, tied to a poll [`Waker`](mio::Waker)
///
/// The flag only ever transitions from *unset* to *set*. Winning that
/// transition also wakes the poll instance the waker belongs to, so a thread
/// blocked inside a poll notices the request promptly.
#[derive(Debug)]
pub(crate) struct Flag {
    waker: Waker,
    state: AtomicBool,
}

impl Flag {
    pub fn new(waker: Waker) -> Self {
        Self {
            waker,
            state: AtomicBool::new(false),
        }
    }

    pub fn set(&self) -> IoResult<bool> {
        match self.state.compare_exchange(false, true, Ordering::Relaxed, Ordering::Relaxed) {
            Ok(_) => {
                self.waker.wake()?;
                Ok(true)
            },
            Err(_) => Ok(false),
        }
    }

    pub fn is_set(&self) -> bool {
        self.state.load(Ordering::Relaxed)
    }
}

/// A handle used to request a graceful shutdown
///
/// Each `ShutdownHandle` is tied to the [`Reactor`](crate::Reactor) it was
/// obtained from. Requesting a shutdown sets the reactor's stop flag and
/// interrupts a pending [`Listener::accept()`](crate::Listener::accept()),
/// which then fails with [`EchoError::Shutdown`](crate::EchoError::Shutdown).
/// Unlike the reactor itself, the handle *can* be moved across the thread
/// boundary, which is what makes it usable from a signal handler.
///
/// The shutdown request is one-way: once requested, it cannot be revoked,
/// and any further request is a no-op.
#[derive(Debug)]
pub struct ShutdownHandle {
    flag: Arc<Flag>,
}

impl ShutdownHandle {
    pub(crate) fn from(flag: Arc<Flag>) -> Self {
        Self {
            flag,
        }
    }

    /// Requests a shutdown. Returns `true` if this call performed the
    /// transition, or `false` if a shutdown was already requested.
    pub fn request(&self) -> IoResult<bool> {
        self.flag.set()
    }

    /// Whether a shutdown has been requested.
    pub fn requested(&self) -> bool {
        self.flag.is_set()
    }

    /// Consumes the handle and installs it as the process-wide handler for
    /// the interrupt (Ctrl+C) and terminate signals. The handler does
    /// nothing but set the flag.
    pub fn install(self) -> Result<(), ctrlc::Error> {
        ctrlc::set_handler(move || {
            if let Err(error) = self.request() {
                error!("failed to request shutdown: {}", error);
            }
        })
    }
}
