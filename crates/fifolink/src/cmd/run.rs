use fifolink_frame::{Framer, Reassembler};
use fifolink_transport::FifoPair;

use crate::cmd::RunArgs;
use crate::config::LinkSettings;
use crate::driver::{install_ctrlc_handler, run_poll_loop, LoopLimits};
use crate::exit::{frame_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: RunArgs, settings: &LinkSettings, format: OutputFormat) -> CliResult<i32> {
    let mut framer = Framer::new(settings.encoding());
    if let Some(message) = &args.message {
        framer
            .encode(message.as_bytes())
            .map_err(|err| frame_error("encode failed", err))?;
    }

    tracing::info!(
        read = ?settings.fifo.read_path,
        write = ?settings.fifo.write_path,
        "opening fifo pair"
    );
    let mut pair =
        FifoPair::open(&settings.fifo).map_err(|err| transport_error("open failed", err))?;

    if let Some(message) = &args.message {
        let report = framer
            .send(&mut pair.outbound, message.as_bytes())
            .map_err(|err| frame_error("send failed", err))?;
        tracing::info!(
            written = report.written,
            requested = report.requested,
            "sent greeting"
        );
    }

    let running = install_ctrlc_handler()?;
    let mut reassembler = Reassembler::with_config(settings.frame.clone());
    let encoding = settings.encoding();
    let source = settings.fifo.read_path.clone();

    run_poll_loop(
        &mut reassembler,
        &mut pair.inbound,
        &running,
        LoopLimits {
            poll_interval: settings.poll_interval,
            max_messages: args.count,
        },
        |len, payload| {
            print_message(len, &payload, &source, encoding, format);
            Ok(())
        },
    )?;

    pair.close();
    Ok(SUCCESS)
}
