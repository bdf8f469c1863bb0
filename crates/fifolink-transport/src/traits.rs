use std::io::Read;

use crate::error::Result;

/// The receiving half of a transport.
///
/// Reads go through [`Read`]: `Ok(0)` means the peer closed its end, and
/// `WouldBlock` means the readiness report was spurious.
pub trait Inbound: Read {
    /// Zero-timeout readiness check. Never blocks.
    fn poll_readable(&mut self) -> Result<bool>;

    /// Close and open the endpoint again at the same location.
    fn reopen(&mut self) -> Result<()>;

    /// Release the endpoint. Closing twice is a no-op.
    fn close(&mut self);
}

/// The sending half of a transport.
pub trait Outbound {
    /// Issue one write and report how many bytes the OS accepted.
    ///
    /// A return value smaller than `buf.len()` is a short write; the caller
    /// decides whether to send the remainder.
    fn write_once(&mut self, buf: &[u8]) -> Result<usize>;
}
