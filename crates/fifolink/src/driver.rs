use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use fifolink_frame::{FrameError, PollOutcome, Reassembler};
use fifolink_transport::Inbound;

use crate::exit::{frame_error, CliError, CliResult, INTERNAL};

/// Cadence and stop conditions of a poll loop.
#[derive(Debug, Clone, Copy)]
pub struct LoopLimits {
    /// Sleep after an idle cycle; zero busy-polls.
    pub poll_interval: Duration,
    /// Stop after this many messages.
    pub max_messages: Option<usize>,
}

/// Flag cleared by Ctrl-C.
pub fn install_ctrlc_handler() -> CliResult<Arc<AtomicBool>> {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    ctrlc::set_handler(move || {
        flag.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))?;
    Ok(running)
}

/// Poll `inbound` until `running` is cleared or the message limit is hit.
///
/// Messages reach `on_message` in wire order. Read errors and oversized
/// buffers are logged and polling continues; anything else ends the loop.
/// Returns the number of messages handled.
pub fn run_poll_loop<I, F>(
    reassembler: &mut Reassembler,
    inbound: &mut I,
    running: &AtomicBool,
    limits: LoopLimits,
    mut on_message: F,
) -> CliResult<usize>
where
    I: Inbound + ?Sized,
    F: FnMut(usize, Bytes) -> CliResult<()>,
{
    let mut handled = 0usize;
    let mut inbox: Vec<(usize, Bytes)> = Vec::new();

    while running.load(Ordering::SeqCst) {
        let outcome =
            reassembler.poll_cycle(inbound, &mut |len: usize, payload: Bytes| {
                inbox.push((len, payload))
            });

        let idle = match outcome {
            Ok(PollOutcome::Idle) => true,
            Ok(PollOutcome::Received { .. }) => false,
            Ok(PollOutcome::Reconnected { discarded }) => {
                tracing::info!(discarded, "peer closed its end; waiting for a new writer");
                true
            }
            Err(FrameError::Io(err)) => {
                tracing::warn!(error = %err, "inbound read failed");
                true
            }
            Err(err @ FrameError::BufferLimitExceeded { .. }) => {
                tracing::warn!(error = %err, "skipping oversized message");
                false
            }
            Err(err) => return Err(frame_error("receive failed", err)),
        };

        for (len, payload) in inbox.drain(..) {
            on_message(len, payload)?;
            handled = handled.saturating_add(1);
            if limits.max_messages.is_some_and(|max| handled >= max) {
                return Ok(handled);
            }
        }

        if idle && !limits.poll_interval.is_zero() {
            std::thread::sleep(limits.poll_interval);
        }
    }

    Ok(handled)
}
