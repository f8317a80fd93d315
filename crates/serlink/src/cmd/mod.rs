use std::time::Duration;

use clap::{Args, Subcommand};
use serlink_transport::StreamLink;

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod envinfo;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one message over a link.
    Send(SendArgs),
    /// Print messages as they arrive.
    Listen(ListenArgs),
    /// Return every received payload to the sender.
    Echo(EchoArgs),
    /// Show version information.
    Version(VersionArgs),
    /// Print build and environment diagnostics.
    Envinfo(EnvinfoArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Echo(args) => echo::run(args),
        Command::Version(args) => version::run(args),
        Command::Envinfo(args) => envinfo::run(args, format),
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Link endpoint: `tcp://HOST:PORT`, `unix://PATH`, or a socket path.
    pub link: String,
    /// Message id (0xFFFF is reserved).
    #[arg(long, short = 'i')]
    pub id: u16,
    /// Scheduling priority (higher wins).
    #[arg(long, short = 'p', default_value = "0")]
    pub priority: u8,
    /// UTF-8 string payload.
    #[arg(long, conflicts_with_all = ["hex", "file"])]
    pub data: Option<String>,
    /// Hex-encoded payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub hex: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["data", "hex"])]
    pub file: Option<std::path::PathBuf>,
    /// Request a delivery receipt and wait for the outcome.
    #[arg(long)]
    pub receipt: bool,
    /// Receipt timeout per transmission (e.g. 100ms).
    #[arg(long, default_value = "100ms")]
    pub receipt_timeout: String,
    /// Transmission budget when a receipt is requested.
    #[arg(long, default_value = "5")]
    pub max_transmissions: u8,
    /// Maximum total time to wait for the delivery outcome.
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Link endpoint: `tcp://HOST:PORT`, `unix://PATH`, or a socket path.
    pub link: String,
    /// Only print messages with this id.
    #[arg(long)]
    pub id: Option<u16>,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Link endpoint: `tcp://HOST:PORT`, `unix://PATH`, or a socket path.
    pub link: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

#[derive(Args, Debug, Default)]
pub struct EnvinfoArgs {}

/// How often the spin loops step the engine.
pub const SPIN_INTERVAL: Duration = Duration::from_millis(2);

/// Connect to a link endpoint given as `tcp://`, `unix://`, or a bare path.
pub fn connect_link(endpoint: &str) -> CliResult<StreamLink> {
    if let Some(addr) = endpoint.strip_prefix("tcp://") {
        return StreamLink::connect_tcp(addr, endpoint)
            .map_err(|err| transport_error("connect failed", err));
    }

    let path = endpoint.strip_prefix("unix://").unwrap_or(endpoint);
    #[cfg(unix)]
    {
        StreamLink::connect_unix(path).map_err(|err| transport_error("connect failed", err))
    }
    #[cfg(not(unix))]
    {
        let _ = path;
        Err(CliError::new(
            USAGE,
            "unix socket links require a unix platform; use tcp://HOST:PORT",
        ))
    }
}

pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        "s" => Ok(Duration::from_secs(value)),
        _ => Err(CliError::new(
            USAGE,
            format!("unsupported duration unit: {unit}"),
        )),
    }
}

pub fn parse_hex(input: &str) -> CliResult<Vec<u8>> {
    let compact: String = input.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.len() % 2 != 0 {
        return Err(CliError::new(USAGE, "hex payload has odd length"));
    }
    (0..compact.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&compact[i..i + 2], 16)
                .map_err(|_| CliError::new(USAGE, format!("invalid hex payload: {input}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_duration_seconds_and_millis() {
        assert_eq!(parse_duration("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_duration("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_duration("3").unwrap(), Duration::from_secs(3));
    }

    #[test]
    fn parse_duration_rejects_invalid_values() {
        assert!(parse_duration("0s").is_err());
        assert!(parse_duration("bad").is_err());
    }

    #[test]
    fn parse_hex_accepts_spaced_bytes() {
        assert_eq!(parse_hex("0a 0B ff").unwrap(), vec![0x0A, 0x0B, 0xFF]);
        assert_eq!(parse_hex("dead").unwrap(), vec![0xDE, 0xAD]);
    }

    #[test]
    fn parse_hex_rejects_malformed_input() {
        assert!(parse_hex("abc").is_err());
        assert!(parse_hex("zz").is_err());
    }

    #[test]
    fn connect_link_rejects_dead_endpoint() {
        let result = connect_link("tcp://127.0.0.1:1");
        assert!(result.is_err());
    }
}
