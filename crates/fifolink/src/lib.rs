//! Bidirectional message channel over a pair of named pipes.
//!
//! fifolink connects two processes through two FIFOs, one per direction, and
//! frames discrete messages on top of the raw byte streams.
//!
//! # Crate Structure
//!
//! - [`transport`]: FIFO creation, non-blocking inbound and blocking outbound endpoints
//! - [`frame`]: Wire encodings, the framer, and the stream reassembler

/// Re-export transport types.
pub mod transport {
    pub use fifolink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use fifolink_frame::*;
}
