use std::fs;

use fifolink_frame::Framer;
use fifolink_transport::{ensure_fifo, OutboundFifo};

use crate::cmd::SendArgs;
use crate::config::LinkSettings;
use crate::exit::{frame_error, transport_error, CliError, CliResult, FAILURE, SUCCESS};
use crate::output::{print_send_report, OutputFormat};

pub fn run(args: SendArgs, settings: &LinkSettings, format: OutputFormat) -> CliResult<i32> {
    let payload = resolve_payload(&args)?;
    let mut framer = Framer::new(settings.encoding());

    // Reject before opening: the outbound open blocks until a reader appears.
    framer
        .encode(&payload)
        .map_err(|err| frame_error("encode failed", err))?;

    let path = &settings.fifo.write_path;
    ensure_fifo(path, settings.fifo.mode).map_err(|err| transport_error("create failed", err))?;
    tracing::debug!(path = ?path, "waiting for a reader");
    let mut outbound =
        OutboundFifo::open(path).map_err(|err| transport_error("open failed", err))?;

    let report = framer
        .send(&mut outbound, &payload)
        .map_err(|err| frame_error("send failed", err))?;
    print_send_report(&report, path, settings.encoding(), format);

    if !report.is_complete() {
        return Err(CliError::new(
            FAILURE,
            format!(
                "short write: {} of {} bytes sent",
                report.written, report.requested
            ),
        ));
    }

    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    if let Some(data) = &args.data {
        return Ok(data.as_bytes().to_vec());
    }
    if let Some(path) = &args.file {
        return fs::read(path).map_err(|err| {
            crate::exit::io_error(&format!("failed reading {}", path.display()), err)
        });
    }
    Ok(Vec::new())
}
