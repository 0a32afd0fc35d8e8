use std::io;
use std::time::Duration;

use gpulink_host::{Host, HostConfig, MessageRegistry};
use gpulink_transport::{HandshakeChannel, LinkStream};
use tracing::info;

use crate::cmd::{parse_hex, SendArgs};
use crate::exit::{host_error, transport_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let ack_timeout = parse_duration(&args.ack_timeout)?;
    let fields: serde_json::Value = serde_json::from_str(&args.json)
        .map_err(|err| CliError::new(USAGE, format!("--json is not valid JSON: {err}")))?;

    let registry = MessageRegistry::load(&args.input_dir)
        .map_err(|err| host_error("loading schemas failed", err))?;
    let value = registry
        .value_from_json(&args.message, &fields)
        .map_err(|err| host_error("invalid message", err))?;

    let config = HostConfig {
        ack_timeout,
        ..HostConfig::default()
    };
    let mut host = Host::open_with_config(&args.device, registry, config)
        .map_err(|err| host_error("open failed", err))?;

    match (&args.ack, &args.ack_device) {
        (Some(ack), Some(ack_device)) => {
            let ack = parse_hex(ack).map_err(|err| CliError::new(USAGE, format!("--ack: {err}")))?;
            let reader = LinkStream::open_reader(ack_device)
                .map_err(|err| transport_error("opening handshake channel failed", err))?;
            reader
                .set_nonblocking(true)
                .map_err(|err| transport_error("opening handshake channel failed", err))?;
            let mut handshake = HandshakeChannel::new(reader, io::sink());
            host.send_acked(&mut handshake, &args.message, &value, &ack)
                .map_err(|err| host_error("send failed", err))?;
            info!(message = %args.message, "acknowledged");
        }
        _ => host
            .send(&args.message, &value)
            .map_err(|err| host_error("send failed", err))?,
    }

    if args.wait {
        let reply = host
            .recv()
            .map_err(|err| host_error("receive failed", err))?;
        print_message(&reply, format);
    }

    Ok(SUCCESS)
}

fn parse_duration(input: &str) -> CliResult<Duration> {
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
