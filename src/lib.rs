/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */

//! **echod** is a TCP echo server built on "blocking" socket operations
//! that stay interruptible: a termination signal sets a one-way flag and
//! wakes the pending accept, so the server shuts down cleanly instead of
//! sitting in an unkillable system call.
//!
//! The "blocking" I/O is emulated via *non-blocking* operations and
//! readiness polling, using the [**`mio`**](mio) library; the polling state
//! lives in a per-thread [`Reactor`](Reactor). A
//! [`ShutdownHandle`](ShutdownHandle) obtained from the accept loop's
//! reactor can be moved into a signal handler (see
//! [`ShutdownHandle::install()`](ShutdownHandle::install())) and is the
//! only way the server is stopped.
//!
//! # Serving modes
//!
//! Two connection-concurrency models are provided, selected via
//! [`server::Mode`](server::Mode):
//!
//! - [`Sequential`](server::Mode::Sequential): a single thread alternates
//!   between accepting and echoing; at most one connection is in progress
//!   and a stalled client blocks everyone behind it. Kept as an explicitly
//!   selectable baseline.
//! - [`Threaded`](server::Mode::Threaded): every accepted connection is
//!   handed to its own worker thread with its own reactor, sharing no
//!   mutable state with the supervisor or sibling workers. Finished
//!   workers are reaped asynchronously by the
//!   [`Supervisor`](Supervisor), so the accept loop is never blocked by
//!   echo traffic or cleanup.
//!
//! In either mode a shutdown request stops only the accept loop;
//! connections already dispatched run to natural completion.

pub mod echo;
pub mod server;

mod connection;
mod error;
mod listener;
mod reactor;
mod shutdown;
mod stream;
mod supervisor;

pub use connection::Connection;
pub use error::EchoError;
pub use listener::Listener;
pub use reactor::Reactor;
pub use shutdown::ShutdownHandle;
pub use stream::ClientStream;
pub use supervisor::Supervisor;
