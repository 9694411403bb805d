/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */

use std::io::{ErrorKind, Result as IoResult};
use std::net::SocketAddr;
use std::rc::Rc;

use mio::net::TcpListener as MioTcpListener;
use mio::{Interest, Token};

use log::warn;

use crate::error::EchoError;
use crate::reactor::Reactor;
use crate::Connection;

/// A TCP socket server, listening for incoming echo clients
///
/// [`accept()`](Listener::accept()) is "blocking" by default, but remains
/// interruptible: once a shutdown has been requested via the reactor's
/// [`ShutdownHandle`](crate::ShutdownHandle), a pending accept fails with
/// [`EchoError::Shutdown`](crate::EchoError::Shutdown) instead of blocking
/// forever. Each `Listener` is tied to the [`Reactor`](crate::Reactor) it
/// was bound with.
///
/// Dropping the `Listener` deregisters and closes the listening endpoint.
#[derive(Debug)]
pub struct Listener {
    listener: MioTcpListener,
    token: Token,
    reactor: Rc<Reactor>,
}

impl Listener {
    pub fn bind(reactor: &Rc<Reactor>, addr: SocketAddr) -> IoResult<Self> {
        let reactor = reactor.clone();
        let mut listener = MioTcpListener::bind(addr)?;

        let token = {
            let context = reactor.context();
            let token = context.token();
            context.registry().register(&mut listener, token, Interest::READABLE)?;
            token
        };

        Ok(Self {
            listener,
            token,
            reactor,
        })
    }

    /// The local address this listener is bound to.
    pub fn local_addr(&self) -> IoResult<SocketAddr> {
        self.listener.local_addr()
    }

    /// Blocks until a client connects or a shutdown is requested.
    ///
    /// Interrupted waits are retried transparently; the shutdown flag is
    /// re-checked after every wake-up. Socket failures are returned to the
    /// caller, which decides whether to retry.
    pub fn accept(&self) -> Result<Connection, EchoError> {
        if self.reactor.shutdown_requested() {
            return Err(EchoError::Shutdown);
        }

        match Self::event_accept(&self.listener) {
            Ok(Some(connection)) => return Ok(connection),
            Ok(None) => (),
            Err(error) => return Err(error.into()),
        }

        let mut context = self.reactor.context_mut();

        loop {
            match context.poll(None) {
                Ok(events) => {
                    for _event in events.iter().filter(|event| event.token() == self.token) {
                        match Self::event_accept(&self.listener) {
                            Ok(Some(connection)) => return Ok(connection),
                            Ok(None) => (),
                            Err(error) => return Err(error.into()),
                        }
                    }
                },
                Err(error) => match error.kind() {
                    ErrorKind::Interrupted => (),
                    _ => return Err(error.into()),
                },
            }
            if self.reactor.shutdown_requested() {
                return Err(EchoError::Shutdown);
            }
        }
    }

    fn event_accept(listener: &MioTcpListener) -> IoResult<Option<Connection>> {
        loop {
            match listener.accept() {
                Ok((stream, peer)) => return Ok(Some(Connection::new(stream, peer))),
                Err(error) => match error.kind() {
                    ErrorKind::Interrupted => (),
                    ErrorKind::WouldBlock => return Ok(None),
                    _ => return Err(error),
                },
            }
        }
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        let context = self.reactor.context();
        if let Err(error) = context.registry().deregister(&mut self.listener) {
            warn!("Failed to de-register: {:?}", error);
        }
    }
}
