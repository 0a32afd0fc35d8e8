use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use gpulink_frame::FrameError;
use gpulink_host::{Host, HostConfig, HostError, MessageRegistry};

use crate::cmd::ListenArgs;
use crate::exit::{host_error, CliError, CliResult, INTERNAL, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let registry = MessageRegistry::load(&args.input_dir)
        .map_err(|err| host_error("loading schemas failed", err))?;
    let config = HostConfig {
        skip_invalid: args.skip_invalid,
        ..HostConfig::default()
    };
    let mut host = Host::open_with_config(&args.device, registry, config)
        .map_err(|err| host_error("open failed", err))?;

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    while running.load(Ordering::SeqCst) {
        let message = match host.recv() {
            Ok(message) => message,
            Err(HostError::Frame(FrameError::ConnectionClosed)) => break,
            Err(err) => return Err(host_error("receive failed", err)),
        };

        print_message(&message, format);
        printed = printed.saturating_add(1);

        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    Ok(SUCCESS)
}

fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
