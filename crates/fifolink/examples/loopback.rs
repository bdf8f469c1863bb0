//! Loopback example: frames messages into a FIFO and reassembles them from
//! the same FIFO within one process.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! Pass `u8` or `delimited` as the first argument to switch encodings.

use std::fs;

use bytes::Bytes;
use fifolink::frame::{FrameEncoding, Framer, PollOutcome, Reassembler};
use fifolink::transport::{ensure_fifo, FifoConfig, InboundFifo, OutboundFifo};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let encoding = match std::env::args().nth(1).as_deref() {
        Some("u8") => FrameEncoding::LengthU8,
        Some("delimited") => FrameEncoding::delimited(),
        _ => FrameEncoding::LengthU16,
    };

    let dir = std::env::temp_dir().join(format!("fifolink-loopback-{}", std::process::id()));
    fs::create_dir_all(&dir)?;
    let path = dir.join("loop.fifo");
    ensure_fifo(&path, FifoConfig::DEFAULT_MODE)?;

    // Reader first, otherwise the blocking writer open never returns.
    let mut inbound = InboundFifo::open(&path)?;
    let mut outbound = OutboundFifo::open(&path)?;

    let mut framer = Framer::new(encoding);
    let messages = ["HELLO FROM C!!!!!", "second", "third and last"];
    for message in messages {
        let report = framer.send(&mut outbound, message.as_bytes())?;
        eprintln!("{} bytes sent out of {}", report.written, report.requested);
    }

    let mut reassembler = Reassembler::new(encoding);
    let mut received = 0usize;
    let mut print = |len: usize, payload: Bytes| {
        received += 1;
        println!(
            "RECEIVED MESSAGE WITH LENGTH {len}: {}",
            String::from_utf8_lossy(&payload)
        );
    };

    loop {
        match reassembler.poll_cycle(&mut inbound, &mut print)? {
            PollOutcome::Received { .. } => {}
            PollOutcome::Idle | PollOutcome::Reconnected { .. } => break,
        }
    }
    eprintln!("{received} of {} messages reassembled", messages.len());

    outbound.close();
    inbound.close();
    fs::remove_dir_all(&dir)?;
    Ok(())
}
