use fifolink_frame::{Framer, Reassembler};
use fifolink_transport::FifoPair;

use crate::cmd::EchoArgs;
use crate::config::LinkSettings;
use crate::driver::{install_ctrlc_handler, run_poll_loop, LoopLimits};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};

pub fn run(args: EchoArgs, settings: &LinkSettings) -> CliResult<i32> {
    let mut pair =
        FifoPair::open(&settings.fifo).map_err(|err| transport_error("open failed", err))?;

    let running = install_ctrlc_handler()?;
    let mut reassembler = Reassembler::with_config(settings.frame.clone());
    let mut framer = Framer::new(settings.encoding());
    let FifoPair { inbound, outbound } = &mut pair;

    // A short write is logged by the framer and the session goes on.
    run_poll_loop(
        &mut reassembler,
        inbound,
        &running,
        LoopLimits {
            poll_interval: settings.poll_interval,
            max_messages: args.count,
        },
        |len, payload| {
            tracing::info!(size = len, "echoing message");
            framer
                .send(outbound, &payload)
                .map(|_| ())
                .map_err(|err| frame_error("echo send failed", err))
        },
    )?;

    pair.close();
    Ok(SUCCESS)
}
