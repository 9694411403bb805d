/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */
use std::io::{Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::thread;
use std::time::{Duration, Instant};

use echod::server::{self, Mode};
use echod::{EchoError, Listener, Reactor, ShutdownHandle, Supervisor};

type ServerThread = thread::JoinHandle<Result<(), EchoError>>;

fn start_server(mode: Mode) -> (SocketAddr, ShutdownHandle, ServerThread) {
    let (ready_tx, ready_rx) = crossbeam_channel::bounded(1);

    let server = thread::spawn(move || {
        let reactor = Reactor::new().expect("failed to create reactor");
        let listener = Listener::bind(&reactor, local_addr()).expect("failed to bind listener");
        let addr = listener.local_addr().expect("failed to query local address");
        ready_tx.send((addr, reactor.shutdown_handle())).expect("failed to publish address");
        server::run(&listener, mode)
    });

    let (addr, handle) = ready_rx.recv().expect("server failed to start");
    (addr, handle, server)
}

fn local_addr() -> SocketAddr {
    "127.0.0.1:0".parse().unwrap()
}

fn echo_session(addr: SocketAddr, payload: &[u8]) -> Vec<u8> {
    let mut client = TcpStream::connect(addr).expect("failed to connect");
    client.set_read_timeout(Some(Duration::from_secs(5))).expect("failed to set timeout");
    client.write_all(payload).expect("failed to send payload");

    let mut reply = vec![0u8; payload.len()];
    client.read_exact(&mut reply).expect("failed to receive echo");
    reply
}

fn stop_server(handle: ShutdownHandle, server: ServerThread) {
    handle.request().expect("failed to request shutdown");
    server.join().expect("server thread panicked").expect("server terminated abnormally");
}

#[test]
fn threaded_server_echoes_hello() {
    let (addr, handle, server) = start_server(Mode::Threaded);

    assert_eq!(echo_session(addr, b"hello"), b"hello");

    stop_server(handle, server);
}

#[test]
fn sequential_server_echoes_consecutive_clients() {
    let (addr, handle, server) = start_server(Mode::Sequential);

    assert_eq!(echo_session(addr, b"first"), b"first");
    assert_eq!(echo_session(addr, b"second"), b"second");

    stop_server(handle, server);
}

#[test]
fn sequential_server_preserves_chunk_order_within_a_session() {
    let (addr, handle, server) = start_server(Mode::Sequential);

    let mut client = TcpStream::connect(addr).expect("failed to connect");
    client.set_read_timeout(Some(Duration::from_secs(5))).expect("failed to set timeout");

    for chunk in [&b"abc"[..], &b"defgh"[..], &b"i"[..]] {
        client.write_all(chunk).expect("failed to send chunk");
        let mut reply = vec![0u8; chunk.len()];
        client.read_exact(&mut reply).expect("failed to receive echo");
        assert_eq!(reply, chunk);
    }

    drop(client);
    stop_server(handle, server);
}

#[test]
fn threaded_server_echoes_large_stream_in_order() {
    let (addr, handle, server) = start_server(Mode::Threaded);

    let payload: Vec<u8> = (0..262144u32).map(|n| (n % 251) as u8).collect();
    let expected = payload.clone();

    let client = TcpStream::connect(addr).expect("failed to connect");
    client.set_read_timeout(Some(Duration::from_secs(10))).expect("failed to set timeout");

    let mut writer = client.try_clone().expect("failed to clone stream");
    let sender = thread::spawn(move || {
        writer.write_all(&payload).expect("failed to send payload");
        writer.shutdown(Shutdown::Write).expect("failed to close write side");
    });

    let mut reply = Vec::new();
    let mut reader = client;
    reader.read_to_end(&mut reply).expect("failed to drain echo");
    sender.join().expect("sender thread panicked");

    assert_eq!(reply, expected);

    stop_server(handle, server);
}

#[test]
fn stalled_client_does_not_delay_other_clients() {
    let (addr, handle, server) = start_server(Mode::Threaded);

    let stalled = TcpStream::connect(addr).expect("failed to connect stalled client");
    assert_eq!(echo_session(addr, b"prompt"), b"prompt");
    drop(stalled);

    stop_server(handle, server);
}

#[test]
fn client_closing_without_data_is_a_clean_disconnect() {
    let (addr, handle, server) = start_server(Mode::Sequential);

    drop(TcpStream::connect(addr).expect("failed to connect"));
    assert_eq!(echo_session(addr, b"still alive"), b"still alive");

    stop_server(handle, server);
}

#[test]
fn shutdown_request_stops_accepting() {
    let (addr, handle, server) = start_server(Mode::Threaded);

    assert!(handle.request().expect("failed to request shutdown"));
    assert!(!handle.request().expect("failed to repeat shutdown request"));
    server.join().expect("server thread panicked").expect("server terminated abnormally");

    assert!(TcpStream::connect(addr).is_err());
}

#[test]
fn accept_reports_shutdown_after_request() {
    let reactor = Reactor::new().expect("failed to create reactor");
    let listener = Listener::bind(&reactor, local_addr()).expect("failed to bind listener");

    reactor.shutdown_handle().request().expect("failed to request shutdown");

    match listener.accept() {
        Err(EchoError::Shutdown) => (),
        other => panic!("expected shutdown, got {:?}", other),
    }
}

#[test]
fn workers_are_reaped_after_connections_finish() {
    let reactor = Reactor::new().expect("failed to create reactor");
    let listener = Listener::bind(&reactor, local_addr()).expect("failed to bind listener");
    let addr = listener.local_addr().expect("failed to query local address");
    let mut supervisor = Supervisor::new().expect("failed to create supervisor");

    let clients: Vec<_> = (0..4)
        .map(|n| {
            thread::spawn(move || {
                let message = format!("client-{}", n);
                assert_eq!(echo_session(addr, message.as_bytes()), message.as_bytes());
            })
        })
        .collect();

    for _ in 0..4 {
        let connection = match listener.accept() {
            Ok(connection) => connection,
            Err(error) => panic!("accept failed: {}", error),
        };
        supervisor.dispatch(connection).expect("failed to dispatch");
    }

    for client in clients {
        client.join().expect("client thread panicked");
    }

    let deadline = Instant::now() + Duration::from_secs(5);
    while supervisor.active() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }
    assert_eq!(supervisor.active(), 0);

    supervisor.shutdown();
}
