/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */
use std::io::{ErrorKind, Read, Result as IoResult, Write};
use std::net::SocketAddr;
use std::rc::Rc;

use mio::net::TcpStream as MioTcpStream;
use mio::{Interest, Token};

use log::warn;

use crate::reactor::Reactor;
use crate::Connection;

/// A client connection registered for "blocking" I/O
///
/// A `ClientStream` is created [`from()`](ClientStream::from()) an accepted
/// [`Connection`](crate::Connection) and is tied to a
/// [`Reactor`](crate::Reactor) instance on the serving thread. The
/// [`Read`](std::io::Read) and [`Write`](std::io::Write) implementations
/// block until the socket is ready, emulated via non-blocking operations
/// plus readiness polling, and transparently retry interrupted calls.
///
/// No I/O deadline is imposed: a peer that neither sends nor closes keeps
/// its stream (and nothing else) waiting indefinitely.
#[derive(Debug)]
pub struct ClientStream {
    stream: MioTcpStream,
    peer: SocketAddr,
    token: Token,
    reactor: Rc<Reactor>,
}

impl ClientStream {
    pub fn from(reactor: &Rc<Reactor>, connection: Connection) -> IoResult<Self> {
        let (mut stream, peer) = connection.into_parts();
        let reactor = reactor.clone();

        let token = {
            let context = reactor.context();
            let token = context.token();
            context.registry().register(&mut stream, token, Interest::READABLE | Interest::WRITABLE)?;
            token
        };

        Ok(Self {
            stream,
            peer,
            token,
            reactor,
        })
    }

    /// The peer socket address of this stream.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    // ~~~~~~~~~~~~~~~~~~~~~~~
    // Readiness helpers
    // ~~~~~~~~~~~~~~~~~~~~~~~

    fn event_read(stream: &mut MioTcpStream, buffer: &mut [u8]) -> IoResult<Option<usize>> {
        loop {
            match stream.read(buffer) {
                Ok(count) => return Ok(Some(count)),
                Err(error) => match error.kind() {
                    ErrorKind::Interrupted => (),
                    ErrorKind::WouldBlock => return Ok(None),
                    _ => return Err(error),
                },
            }
        }
    }

    fn event_write(stream: &mut MioTcpStream, buffer: &[u8]) -> IoResult<Option<usize>> {
        loop {
            match stream.write(buffer) {
                Ok(count) => return Ok(Some(count)),
                Err(error) => match error.kind() {
                    ErrorKind::Interrupted => (),
                    ErrorKind::WouldBlock => return Ok(None),
                    _ => return Err(error),
                },
            }
        }
    }
}

impl Read for ClientStream {
    fn read(&mut self, buffer: &mut [u8]) -> IoResult<usize> {
        match Self::event_read(&mut self.stream, buffer) {
            Ok(Some(count)) => return Ok(count),
            Ok(None) => (),
            Err(error) => return Err(error),
        }

        let mut context = self.reactor.context_mut();

        loop {
            match context.poll(None) {
                Ok(events) => {
                    for _event in events.iter().filter(|event| (event.token() == self.token) && event.is_readable()) {
                        match Self::event_read(&mut self.stream, buffer) {
                            Ok(Some(count)) => return Ok(count),
                            Ok(None) => (),
                            Err(error) => return Err(error),
                        }
                    }
                },
                Err(error) => match error.kind() {
                    ErrorKind::Interrupted => (),
                    _ => return Err(error),
                },
            }
        }
    }
}

impl Write for ClientStream {
    fn write(&mut self, buffer: &[u8]) -> IoResult<usize> {
        match Self::event_write(&mut self.stream, buffer) {
            Ok(Some(count)) => return Ok(count),
            Ok(None) => (),
            Err(error) => return Err(error),
        }

        let mut context = self.reactor.context_mut();

        loop {
            match context.poll(None) {
                Ok(events) => {
                    for _event in events.iter().filter(|event| (event.token() == self.token) && event.is_writable()) {
                        match Self::event_write(&mut self.stream, buffer) {
                            Ok(Some(count)) => return Ok(count),
                            Ok(None) => (),
                            Err(error) => return Err(error),
                        }
                    }
                },
                Err(error) => match error.kind() {
                    ErrorKind::Interrupted => (),
                    _ => return Err(error),
                },
            }
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        self.stream.flush()
    }
}

impl Drop for ClientStream {
    fn drop(&mut self) {
        let context = self.reactor.context();
        if let Err(error) = context.registry().deregister(&mut self.stream) {
            warn!("Failed to de-register: {:?}", error);
        }
    }
}
