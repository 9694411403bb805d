/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */

//! The echo protocol: whatever a client sends comes back unmodified, in
//! receive order, until the client closes its write side.

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult, Write};
use std::rc::Rc;

use log::{info, warn};

use crate::reactor::Reactor;
use crate::stream::ClientStream;
use crate::Connection;

const BUFFER_SIZE: usize = 4096;

/// Drives one connection to completion, echoing every received chunk back
/// to its sender.
///
/// Returns the total number of bytes echoed once the peer closes its write
/// side (a zero-byte read). Interrupted reads and writes are retried; a
/// short write is not an error, the remainder is written in further calls
/// until the chunk is fully flushed. Any other I/O failure terminates the
/// connection with that error.
pub fn serve<S: Read + Write>(stream: &mut S) -> IoResult<u64> {
    let mut buffer = [0u8; BUFFER_SIZE];
    let mut echoed = 0u64;

    loop {
        let received = match stream.read(&mut buffer) {
            Ok(0) => return Ok(echoed),
            Ok(count) => count,
            Err(error) => match error.kind() {
                ErrorKind::Interrupted => continue,
                _ => return Err(error),
            },
        };
        write_fully(stream, &buffer[..received])?;
        echoed += received as u64;
    }
}

fn write_fully<S: Write>(stream: &mut S, mut pending: &[u8]) -> IoResult<()> {
    while !pending.is_empty() {
        match stream.write(pending) {
            Ok(0) => return Err(IoError::new(ErrorKind::WriteZero, "connection no longer accepts data")),
            Ok(count) => pending = &pending[count..],
            Err(error) => match error.kind() {
                ErrorKind::Interrupted => (),
                _ => return Err(error),
            },
        }
    }
    Ok(())
}

/// Registers an accepted connection with the given reactor and serves it,
/// logging the outcome.
pub fn serve_client(reactor: &Rc<Reactor>, connection: Connection) {
    let peer = connection.peer_addr();

    let mut stream = match ClientStream::from(reactor, connection) {
        Ok(value) => value,
        Err(error) => return warn!("Failed to set up client stream for {}: {}", peer, error),
    };

    match serve(&mut stream) {
        Ok(echoed) => info!("client disconnected: {} ({} bytes echoed)", peer, echoed),
        Err(error) => warn!("client {} failed: {}", peer, error),
    }
}
