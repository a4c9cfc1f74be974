use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand};
use wirelink_frame::DEFAULT_MAX_FRAME_SIZE;

use crate::exit::{CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod echo;
pub mod listen;
pub mod probe;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Accept connections and echo every message back.
    Echo(EchoArgs),
    /// Send a single message.
    Send(SendArgs),
    /// Accept connections and print received messages.
    Listen(ListenArgs),
    /// Check port availability and local addresses.
    Probe(ProbeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Echo(args) => echo::run(args).await,
        Command::Send(args) => send::run(args, format).await,
        Command::Listen(args) => listen::run(args, format).await,
        Command::Probe(args) => probe::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct EchoArgs {
    /// Address to listen on (e.g. 127.0.0.1:9000).
    pub addr: String,
    /// Only echo these type ids (comma-separated). Default: all.
    #[arg(long, value_delimiter = ',')]
    pub type_ids: Option<Vec<u16>>,
    /// Largest accepted frame in bytes, header included.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE, value_parser = parse_frame_size)]
    pub max_frame_size: usize,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Address to connect to.
    pub addr: String,
    /// Message type id.
    #[arg(long, short = 't', default_value = "1")]
    pub type_id: u16,
    /// JSON payload.
    #[arg(long, conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Raw string payload.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read payload from file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Wait for one response message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait for the send, and for a response with --wait (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Address to listen on.
    pub addr: String,
    /// Filter to specific type ids (comma-separated).
    #[arg(long, value_delimiter = ',')]
    pub type_ids: Option<Vec<u16>>,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Largest accepted frame in bytes, header included.
    #[arg(long, default_value_t = DEFAULT_MAX_FRAME_SIZE, value_parser = parse_frame_size)]
    pub max_frame_size: usize,
}

#[derive(Args, Debug)]
pub struct ProbeArgs {
    /// Also report whether this TCP port can be bound.
    #[arg(long)]
    pub port: Option<u16>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn parse_frame_size(input: &str) -> Result<usize, String> {
    let size: usize = input.parse().map_err(|err| format!("{err}"))?;
    if size == 0 {
        return Err("must be greater than zero".to_string());
    }
    Ok(size)
}

pub(crate) fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, false)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;
    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}
