use clap::{Args, Subcommand};
use std::path::PathBuf;

use gpulink_codegen::Target;

use crate::exit::CliResult;
use crate::output::OutputFormat;

pub mod compile;
pub mod decode;
pub mod ids;
pub mod listen;
pub mod send;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate C++ and Python bindings from a schema directory.
    Compile(CompileArgs),
    /// Print the message id table of a schema directory.
    Ids(IdsArgs),
    /// Decode every frame in a captured byte stream.
    Decode(DecodeArgs),
    /// Encode and send one message to a device.
    Send(SendArgs),
    /// Print messages received from a device.
    Listen(ListenArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Compile(args) => compile::run(args, format),
        Command::Ids(args) => ids::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Send(args) => send::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Root directory of the schema corpus.
    pub input_dir: PathBuf,
    /// Directory receiving one subdirectory per target.
    #[arg(long, short = 'o')]
    pub output: PathBuf,
    /// Targets to generate (comma-separated).
    #[arg(long, short = 't', value_delimiter = ',', default_value = "cpp,python")]
    pub target: Vec<Target>,
}

#[derive(Args, Debug)]
pub struct IdsArgs {
    /// Root directory of the schema corpus.
    pub input_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Root directory of the schema corpus.
    pub input_dir: PathBuf,
    /// Captured stream file.
    #[arg(long, conflicts_with = "hex", required_unless_present = "hex")]
    pub file: Option<PathBuf>,
    /// Captured stream as hex digits (whitespace ignored).
    #[arg(long)]
    pub hex: Option<String>,
    /// Zero-length payloads carry no payload checksum.
    #[arg(long)]
    pub bare_empty: bool,
    /// Largest accepted payload in bytes.
    #[arg(long)]
    pub max_payload: Option<usize>,
}

#[derive(Args, Debug)]
pub struct SendArgs {
    /// Device, FIFO or serial port path.
    pub device: PathBuf,
    /// Root directory of the schema corpus.
    pub input_dir: PathBuf,
    /// Message (struct) name.
    #[arg(long, short = 'm')]
    pub message: String,
    /// Message fields as a JSON object.
    #[arg(long, default_value = "{}")]
    pub json: String,
    /// Wait for one message in response and print it.
    #[arg(long)]
    pub wait: bool,
    /// Acknowledgement bytes expected on the handshake channel (hex).
    #[arg(long, requires = "ack_device")]
    pub ack: Option<String>,
    /// Handshake channel path.
    #[arg(long, requires = "ack")]
    pub ack_device: Option<PathBuf>,
    /// How long to wait for the acknowledgement (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms")]
    pub ack_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    /// Device, FIFO or serial port path.
    pub device: PathBuf,
    /// Root directory of the schema corpus.
    pub input_dir: PathBuf,
    /// Exit after receiving N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Keep listening past corrupt frames and unknown messages.
    #[arg(long)]
    pub skip_invalid: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse hex digits, ignoring whitespace and an optional `0x` prefix.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, String> {
    let digits: String = input
        .trim()
        .trim_start_matches("0x")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if let Some(bad) = digits.chars().find(|c| !c.is_ascii_hexdigit()) {
        return Err(format!("invalid hex digit `{bad}`"));
    }
    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits: {}", digits.len()));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16).map_err(|err| err.to_string())
        })
        .collect()
}
