use std::path::PathBuf;

/// Errors that can occur in FIFO transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Failed to create the FIFO at the specified path.
    #[error("failed to create fifo {path}: {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to open the FIFO at the specified path.
    #[error("failed to open fifo {path}: {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The path exists but is not a FIFO.
    #[error("existing path is not a fifo: {path}")]
    NotAFifo { path: PathBuf },

    /// The path cannot be passed to the OS.
    #[error("fifo path contains an interior NUL byte: {path}")]
    PathContainsNul { path: PathBuf },

    /// Readiness polling failed.
    #[error("failed to poll fifo: {0}")]
    Poll(std::io::Error),

    /// An I/O error occurred on an open endpoint.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The endpoint has been closed.
    #[error("fifo endpoint is closed")]
    Closed,

    /// Named pipes are not available on this platform.
    #[error("named pipes are not supported on this platform")]
    Unsupported,
}

pub type Result<T> = std::result::Result<T, TransportError>;
