//! Named-pipe transport for fifolink.
//!
//! Two unidirectional FIFOs, one per direction, opened by path by two
//! independent processes:
//! - an inbound endpoint, read-only and non-blocking, polled for readiness
//! - an outbound endpoint, write-only and blocking
//!
//! This is the lowest layer of fifolink. The framing layer only sees the
//! [`Inbound`] and [`Outbound`] traits, so it can be driven by any byte
//! source that honours the same contract.

pub mod error;
pub mod fifo;
pub mod traits;

pub use error::{Result, TransportError};
pub use fifo::{ensure_fifo, FifoConfig, FifoPair, InboundFifo, OutboundFifo};
pub use traits::{Inbound, Outbound};
