/// Errors that can occur during framing and reassembly.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds what the encoding's length header can express.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The payload contains the terminator byte of a delimited encoding.
    #[error("payload contains the frame terminator at offset {offset}")]
    DelimiterInPayload { offset: usize },

    /// A message outgrew the configured bound; its bytes are dropped through
    /// its end. `buffered` is the declared length for length-prefixed frames.
    #[error("reassembly buffer limit exceeded ({buffered} bytes, max {max})")]
    BufferLimitExceeded { buffered: usize, max: usize },

    /// The underlying FIFO transport failed.
    #[error("transport error: {0}")]
    Transport(#[from] fifolink_transport::TransportError),

    /// An I/O error occurred while reading frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FrameError>;
