use fifolink_frame::Reassembler;
use fifolink_transport::{ensure_fifo, InboundFifo};

use crate::cmd::ListenArgs;
use crate::config::LinkSettings;
use crate::driver::{install_ctrlc_handler, run_poll_loop, LoopLimits};
use crate::exit::{transport_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ListenArgs, settings: &LinkSettings, format: OutputFormat) -> CliResult<i32> {
    let path = &settings.fifo.read_path;
    ensure_fifo(path, settings.fifo.mode).map_err(|err| transport_error("create failed", err))?;
    let mut inbound = InboundFifo::open(path).map_err(|err| transport_error("open failed", err))?;

    let running = install_ctrlc_handler()?;
    let mut reassembler = Reassembler::with_config(settings.frame.clone());
    let encoding = settings.encoding();

    tracing::info!(path = ?path, "listening for messages");
    run_poll_loop(
        &mut reassembler,
        &mut inbound,
        &running,
        LoopLimits {
            poll_interval: settings.poll_interval,
            max_messages: args.count,
        },
        |len, payload| {
            print_message(len, &payload, path, encoding, format);
            Ok(())
        },
    )?;

    Ok(SUCCESS)
}
