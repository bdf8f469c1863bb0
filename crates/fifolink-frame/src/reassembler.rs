use std::io::{ErrorKind, Read};

use bytes::{Buf, Bytes, BytesMut};
use fifolink_transport::Inbound;
use tracing::{debug, info, warn};

use crate::codec::{FrameConfig, FrameEncoding};
use crate::error::{FrameError, Result};

/// Buffers at or below this capacity are never shrunk.
const MIN_SHRINK_CAPACITY: usize = 8 * 1024;

/// Receives every fully reassembled message, in wire order.
///
/// `length` equals `payload.len()`; for length-prefixed encodings it is the
/// length declared by the header.
pub trait MessageHandler {
    fn on_message(&mut self, length: usize, payload: Bytes);
}

impl<F> MessageHandler for F
where
    F: FnMut(usize, Bytes),
{
    fn on_message(&mut self, length: usize, payload: Bytes) {
        self(length, payload)
    }
}

/// Result of one poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Nothing was ready to read.
    Idle,
    /// A chunk was read and `delivered` messages were handed to the handler.
    Received { bytes: usize, delivered: usize },
    /// The peer closed its end; the inbound endpoint was reopened and
    /// `discarded` buffered bytes were dropped.
    Reconnected { discarded: usize },
}

/// Remainder of an oversized message that is dropped as it arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Discard {
    /// Declared payload bytes still to skip.
    Bytes(usize),
    /// Skip up to and including the next terminator.
    ThroughTerminator(u8),
}

/// Accumulation state of one inbound connection.
///
/// At most one message is in progress at a time, and after every drain pass
/// nothing decodable is left behind: everything complete has been delivered.
#[derive(Debug, Default)]
pub struct ReassemblyState {
    /// Bytes read but not yet attributed to a header or payload.
    pending: BytesMut,
    /// `None` while waiting for a header, `Some(n)` while accumulating a
    /// payload of `n` bytes.
    expected_length: Option<usize>,
    /// Payload bytes collected so far; never longer than `expected_length`.
    partial_payload: BytesMut,
    /// Delimited encoding only: offset up to which `pending` is known to be
    /// free of the terminator.
    scan_cursor: usize,
    /// Set after a message overflowed the buffer limit, until its last byte
    /// has gone by.
    discarding: Option<Discard>,
}

impl ReassemblyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop everything, including any message in flight, and release memory.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// True when no bytes are held and no message is in progress.
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
            && self.expected_length.is_none()
            && self.partial_payload.is_empty()
            && self.discarding.is_none()
    }

    /// True while the tail of an oversized message is being skipped.
    pub fn is_discarding(&self) -> bool {
        self.discarding.is_some()
    }

    /// Bytes held that have not been delivered yet.
    pub fn buffered_len(&self) -> usize {
        self.pending.len() + self.partial_payload.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn expected_length(&self) -> Option<usize> {
        self.expected_length
    }

    pub fn partial_len(&self) -> usize {
        self.partial_payload.len()
    }

    pub fn scan_cursor(&self) -> usize {
        self.scan_cursor
    }

    /// Append `bytes` and deliver every message they complete.
    ///
    /// A message larger than `max_buffered` is never delivered. Its bytes are
    /// dropped up to its end, the messages after it are delivered normally,
    /// and the call reports [`FrameError::BufferLimitExceeded`].
    fn ingest<H>(
        &mut self,
        encoding: FrameEncoding,
        max_buffered: usize,
        bytes: &[u8],
        handler: &mut H,
    ) -> Result<usize>
    where
        H: MessageHandler + ?Sized,
    {
        self.pending.extend_from_slice(bytes);

        let mut overflow = None;
        let delivered = match encoding {
            FrameEncoding::Delimited { terminator } => {
                let delivered = self.drain_delimited(terminator, handler);
                // Whatever is left holds no terminator: it all belongs to
                // the message in flight.
                if self.pending.len() > max_buffered {
                    overflow = Some(self.pending.len());
                    self.pending.clear();
                    self.scan_cursor = 0;
                    self.discarding = Some(Discard::ThroughTerminator(terminator));
                }
                delivered
            }
            _ => self.drain_length_prefixed(encoding, max_buffered, &mut overflow, handler),
        };

        self.compact();

        match overflow {
            Some(buffered) => {
                warn!(
                    buffered,
                    max = max_buffered,
                    "reassembly buffer limit exceeded; skipping message"
                );
                Err(FrameError::BufferLimitExceeded {
                    buffered,
                    max: max_buffered,
                })
            }
            None => Ok(delivered),
        }
    }

    /// Drop bytes of an abandoned message from the front of `pending`.
    ///
    /// Returns `false` while more of that message is still to come.
    fn skip_discarded(&mut self) -> bool {
        match self.discarding {
            None => true,
            Some(Discard::Bytes(remaining)) => {
                let skipped = remaining.min(self.pending.len());
                self.pending.advance(skipped);
                if skipped == remaining {
                    self.discarding = None;
                    true
                } else {
                    self.discarding = Some(Discard::Bytes(remaining - skipped));
                    false
                }
            }
            Some(Discard::ThroughTerminator(terminator)) => {
                match self.pending.iter().position(|&b| b == terminator) {
                    Some(at) => {
                        self.pending.advance(at + 1);
                        self.discarding = None;
                        true
                    }
                    None => {
                        self.pending.clear();
                        false
                    }
                }
            }
        }
    }

    fn drain_length_prefixed<H>(
        &mut self,
        encoding: FrameEncoding,
        max_buffered: usize,
        overflow: &mut Option<usize>,
        handler: &mut H,
    ) -> usize
    where
        H: MessageHandler + ?Sized,
    {
        let mut delivered = 0usize;

        loop {
            if !self.skip_discarded() {
                break;
            }

            let expected = match self.expected_length {
                Some(expected) => expected,
                None => match encoding.take_header(&mut self.pending) {
                    Some(expected) if expected > max_buffered => {
                        *overflow = Some(expected);
                        self.discarding = Some(Discard::Bytes(expected));
                        continue;
                    }
                    Some(expected) => {
                        self.expected_length = Some(expected);
                        expected
                    }
                    None => break,
                },
            };

            let needed = expected - self.partial_payload.len();
            if self.pending.len() < needed {
                self.partial_payload.extend_from_slice(&self.pending);
                self.pending.clear();
                break;
            }

            let payload = if self.partial_payload.is_empty() {
                self.pending.split_to(needed).freeze()
            } else {
                self.partial_payload
                    .extend_from_slice(&self.pending[..needed]);
                self.pending.advance(needed);
                self.partial_payload.split().freeze()
            };
            self.expected_length = None;

            handler.on_message(expected, payload);
            delivered += 1;
        }

        delivered
    }

    fn drain_delimited<H>(&mut self, terminator: u8, handler: &mut H) -> usize
    where
        H: MessageHandler + ?Sized,
    {
        let mut delivered = 0usize;

        loop {
            if !self.skip_discarded() {
                break;
            }

            let start = self.scan_cursor.min(self.pending.len());
            match self.pending[start..].iter().position(|&b| b == terminator) {
                Some(offset) => {
                    let message = self.pending.split_to(start + offset).freeze();
                    self.pending.advance(1);
                    self.scan_cursor = 0;

                    handler.on_message(message.len(), message);
                    delivered += 1;
                }
                None => {
                    self.scan_cursor = self.pending.len().saturating_sub(1);
                    break;
                }
            }
        }

        delivered
    }

    fn compact(&mut self) {
        shrink_if_sparse(&mut self.pending);
        shrink_if_sparse(&mut self.partial_payload);
    }
}

/// Halve the capacity of a large buffer that is less than a quarter full.
fn shrink_if_sparse(buf: &mut BytesMut) {
    let capacity = buf.capacity();
    if capacity > MIN_SHRINK_CAPACITY && buf.len() < capacity / 4 {
        let mut shrunk = BytesMut::with_capacity((capacity / 2).max(buf.len()));
        shrunk.extend_from_slice(buf);
        *buf = shrunk;
    }
}

/// Turns an arbitrarily chunked inbound byte stream into whole messages.
///
/// Each call to [`poll_cycle`](Self::poll_cycle) performs one non-blocking
/// readiness check and at most one bounded read, then delivers every message
/// the new bytes complete. The caller owns the poll loop and the transport;
/// the reassembler owns the accumulation state.
#[derive(Debug)]
pub struct Reassembler {
    config: FrameConfig,
    state: ReassemblyState,
    chunk: Vec<u8>,
}

impl Reassembler {
    /// Create a reassembler for `encoding` with default limits.
    pub fn new(encoding: FrameEncoding) -> Self {
        Self::with_config(FrameConfig::with_encoding(encoding))
    }

    /// Create a reassembler with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        let chunk = vec![0u8; config.read_chunk_size.max(1)];
        Self {
            config,
            state: ReassemblyState::new(),
            chunk,
        }
    }

    /// Run one poll cycle against `inbound`.
    ///
    /// A read error other than `WouldBlock`/`Interrupted` is returned with
    /// the state untouched, so the next cycle resumes where this one left
    /// off. End-of-stream reopens `inbound` and discards the state.
    pub fn poll_cycle<I, H>(&mut self, inbound: &mut I, handler: &mut H) -> Result<PollOutcome>
    where
        I: Inbound + ?Sized,
        H: MessageHandler + ?Sized,
    {
        if !inbound.poll_readable()? {
            return Ok(PollOutcome::Idle);
        }

        let read = match inbound.read(&mut self.chunk) {
            Ok(n) => n,
            Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                return Ok(PollOutcome::Idle);
            }
            Err(err) => {
                warn!(error = %err, "inbound read failed; will retry next cycle");
                return Err(FrameError::Io(err));
            }
        };

        if read == 0 {
            let discarded = self.state.buffered_len();
            info!(discarded, "writer closed pipe; reopening inbound endpoint");
            self.state.reset();
            inbound.reopen()?;
            return Ok(PollOutcome::Reconnected { discarded });
        }

        debug!(bytes = read, "read chunk from inbound endpoint");
        let delivered = self.state.ingest(
            self.config.encoding,
            self.config.max_buffered_bytes,
            &self.chunk[..read],
            handler,
        )?;

        Ok(PollOutcome::Received {
            bytes: read,
            delivered,
        })
    }

    /// Feed bytes obtained elsewhere through the drain loop.
    ///
    /// Returns the number of messages delivered.
    pub fn feed<H>(&mut self, bytes: &[u8], handler: &mut H) -> Result<usize>
    where
        H: MessageHandler + ?Sized,
    {
        self.state.ingest(
            self.config.encoding,
            self.config.max_buffered_bytes,
            bytes,
            handler,
        )
    }

    /// Discard all buffered bytes and any message in progress.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn state(&self) -> &ReassemblyState {
        &self.state
    }

    pub fn encoding(&self) -> FrameEncoding {
        self.config.encoding
    }

    /// Current reassembler configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}
