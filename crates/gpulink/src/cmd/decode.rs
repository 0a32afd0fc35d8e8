use std::fs;
use std::io::Cursor;

use gpulink_frame::{EmptyPayload, FrameConfig, FrameError, FrameReader, DEFAULT_MAX_PAYLOAD};
use gpulink_host::{HostError, MessageRegistry};
use tracing::warn;

use crate::cmd::{parse_hex, DecodeArgs};
use crate::exit::{frame_error, host_error, io_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_decode_summary, print_message, DecodeSummary, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = MessageRegistry::load(&args.input_dir)
        .map_err(|err| host_error("loading schemas failed", err))?;
    let bytes = capture_bytes(&args)?;
    let config = FrameConfig {
        max_payload_size: args.max_payload.unwrap_or(DEFAULT_MAX_PAYLOAD),
        empty_payload: if args.bare_empty {
            EmptyPayload::Bare
        } else {
            EmptyPayload::Checksummed
        },
    };

    let mut reader = FrameReader::with_config(Cursor::new(bytes), config);
    let mut summary = DecodeSummary::default();
    loop {
        let frame = match reader.read_frame() {
            Ok(frame) => frame,
            Err(FrameError::ConnectionClosed) => break,
            Err(err) if err.is_recoverable() => {
                summary.dropped += 1;
                continue;
            }
            Err(err) => return Err(frame_error("decode failed", err)),
        };
        match registry.decode(&frame) {
            Ok(message) => {
                summary.messages += 1;
                print_message(&message, format);
            }
            Err(err @ (HostError::UnknownMessageId(_) | HostError::PayloadSize { .. })) => {
                warn!(id = frame.id, error = %err, "dropping undecodable message");
                summary.dropped += 1;
            }
            Err(err) => return Err(host_error("decode failed", err)),
        }
    }
    summary.skipped_bytes = reader.skipped_bytes();
    print_decode_summary(&summary, format);
    Ok(SUCCESS)
}

fn capture_bytes(args: &DecodeArgs) -> CliResult<Vec<u8>> {
    if let Some(hex) = &args.hex {
        return parse_hex(hex).map_err(|err| CliError::new(USAGE, format!("--hex: {err}")));
    }
    match &args.file {
        Some(path) => fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err)),
        None => Err(CliError::new(USAGE, "one of --file or --hex is required")),
    }
}
