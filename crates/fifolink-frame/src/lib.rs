//! Message framing and stream reassembly for fifolink.
//!
//! This is the core of fifolink. A FIFO is a plain byte stream, so every
//! message is framed with one of three mutually incompatible encodings:
//! - a 2-byte big-endian length header (payloads up to 65535 bytes)
//! - a 1-byte length header (payloads up to 255 bytes)
//! - a single reserved terminator byte after the payload
//!
//! [`Framer`] writes frames; [`Reassembler`] turns arbitrarily chunked reads
//! back into whole messages, one poll cycle at a time.

pub mod codec;
pub mod error;
pub mod reassembler;
pub mod writer;

pub use codec::{
    Frame, FrameConfig, FrameEncoding, DEFAULT_MAX_BUFFERED, DEFAULT_READ_CHUNK_SIZE,
    DEFAULT_TERMINATOR, MAX_PAYLOAD_U16, MAX_PAYLOAD_U8,
};
pub use error::{FrameError, Result};
pub use reassembler::{MessageHandler, PollOutcome, ReassemblyState, Reassembler};
pub use writer::{Framer, SendReport};
