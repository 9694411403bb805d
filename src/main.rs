/*
 * echod - TCP echo server with interruptible blocking I/O
 * This is free and unencumbered software released into the public domain.
 */
use std::env;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::ExitCode;

use echod::server::{self, Mode};
use echod::{Listener, Reactor};

use log::{error, info};

const DEFAULT_PORT: u16 = 8080;
const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug)]
struct Options {
    port: u16,
    mode: Mode,
}

fn parse_args<Args: Iterator<Item = String>>(args: Args) -> Result<Options, String> {
    let mut options = Options {
        port: DEFAULT_PORT,
        mode: Mode::Threaded,
    };

    for argument in args {
        match argument.as_str() {
            "--sequential" | "-s" => options.mode = Mode::Sequential,
            value if value.starts_with('-') => return Err(format!("unrecognized option: {}", value)),
            value => match value.parse::<u16>() {
                Ok(port) => options.port = port,
                Err(_) => return Err(format!("invalid port number: {}", value)),
            },
        }
    }

    Ok(options)
}

fn main() -> ExitCode {
    /* Initialize the log output */
    env_logger::init_from_env(env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info"));

    /* Parse command line */
    let options = match parse_args(env::args().skip(1)) {
        Ok(value) => value,
        Err(message) => {
            error!("{}", message);
            error!("usage: echod [--sequential] [port]");
            return ExitCode::FAILURE;
        },
    };

    info!("echod - TCP echo server [Version {}]", PKG_VERSION);

    /* Set up the reactor for the accept loop */
    let reactor = match Reactor::new() {
        Ok(value) => value,
        Err(error) => {
            error!("failed to set up polling: {}", error);
            return ExitCode::FAILURE;
        },
    };

    /* Register shutdown handle with the termination signals */
    if let Err(error) = reactor.shutdown_handle().install() {
        error!("failed to install signal handlers: {}", error);
        return ExitCode::FAILURE;
    }

    /* Bind the listener to all local addresses */
    let addr = SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), options.port);
    let listener = match Listener::bind(&reactor, addr) {
        Ok(value) => value,
        Err(error) => {
            error!("failed to bind {}: {}", addr, error);
            return ExitCode::FAILURE;
        },
    };

    match listener.local_addr() {
        Ok(local) => info!("listening on {} ({} mode)", local, options.mode),
        Err(_) => info!("listening on {} ({} mode)", addr, options.mode),
    }

    /* Accept clients until a termination signal arrives */
    if let Err(error) = server::run(&listener, options.mode) {
        error!("server terminated abnormally: {}", error);
        return ExitCode::FAILURE;
    }

    info!("goodbye");
    ExitCode::SUCCESS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> impl Iterator<Item = String> {
        values.iter().map(|value| value.to_string()).collect::<Vec<_>>().into_iter()
    }

    #[test]
    fn defaults_to_threaded_mode_on_default_port() {
        let options = parse_args(args(&[])).unwrap();
        assert_eq!(options.port, DEFAULT_PORT);
        assert_eq!(options.mode, Mode::Threaded);
    }

    #[test]
    fn parses_port_and_sequential_flag() {
        let options = parse_args(args(&["--sequential", "9000"])).unwrap();
        assert_eq!(options.port, 9000);
        assert_eq!(options.mode, Mode::Sequential);
    }

    #[test]
    fn rejects_unknown_options_and_bad_ports() {
        assert!(parse_args(args(&["--verbose"])).is_err());
        assert!(parse_args(args(&["65536"])).is_err());
        assert!(parse_args(args(&["not-a-port"])).is_err());
    }
}
