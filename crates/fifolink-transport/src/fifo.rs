use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{Inbound, Outbound};

/// Locations and creation mode of a FIFO pair.
///
/// Each process reads the FIFO the other one writes, so the two sides of a
/// link use mirrored configs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FifoConfig {
    /// FIFO this process reads from.
    pub read_path: PathBuf,
    /// FIFO this process writes to.
    pub write_path: PathBuf,
    /// Permission bits used when a FIFO has to be created (subject to umask).
    pub mode: u32,
}

impl FifoConfig {
    /// Default permission mode for created FIFOs.
    pub const DEFAULT_MODE: u32 = 0o600;
    /// Default inbound location.
    pub const DEFAULT_READ_PATH: &'static str = "/tmp/pyfifo";
    /// Default outbound location.
    pub const DEFAULT_WRITE_PATH: &'static str = "/tmp/cfifo";

    /// Config for the opposite side of the link.
    pub fn mirrored(&self) -> Self {
        Self {
            read_path: self.write_path.clone(),
            write_path: self.read_path.clone(),
            mode: self.mode,
        }
    }
}

impl Default for FifoConfig {
    fn default() -> Self {
        Self {
            read_path: PathBuf::from(Self::DEFAULT_READ_PATH),
            write_path: PathBuf::from(Self::DEFAULT_WRITE_PATH),
            mode: Self::DEFAULT_MODE,
        }
    }
}

/// Create a FIFO at `path` unless one already exists.
///
/// Returns `true` when the FIFO was created by this call. An existing path
/// that is not a FIFO is rejected, never replaced.
pub fn ensure_fifo(path: impl AsRef<Path>, mode: u32) -> Result<bool> {
    let path = path.as_ref();

    if check_existing(path)? {
        debug!(?path, "reusing existing fifo");
        return Ok(false);
    }

    match sys::mkfifo(path, mode) {
        Ok(()) => {
            info!(?path, mode = format_args!("{mode:o}"), "created fifo");
            Ok(true)
        }
        // Lost a creation race with the peer; accept whatever won if it is a FIFO.
        Err(TransportError::Create { source, .. }) if source.kind() == ErrorKind::AlreadyExists => {
            if check_existing(path)? {
                Ok(false)
            } else {
                Err(TransportError::NotAFifo {
                    path: path.to_path_buf(),
                })
            }
        }
        Err(err) => Err(err),
    }
}

/// `Ok(true)` if `path` is an existing FIFO, `Ok(false)` if nothing is there.
fn check_existing(path: &Path) -> Result<bool> {
    match std::fs::symlink_metadata(path) {
        Ok(metadata) if sys::is_fifo(&metadata) => Ok(true),
        Ok(_) => Err(TransportError::NotAFifo {
            path: path.to_path_buf(),
        }),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
        Err(err) => Err(TransportError::Create {
            path: path.to_path_buf(),
            source: err,
        }),
    }
}

/// Read-only, non-blocking FIFO endpoint.
///
/// Opening never waits for a writer. A read returning `Ok(0)` means the last
/// writer went away; [`InboundFifo::reopen`] gets a fresh endpoint that waits
/// for the next one.
#[derive(Debug)]
pub struct InboundFifo {
    path: PathBuf,
    file: Option<File>,
}

impl InboundFifo {
    /// Open an existing FIFO for non-blocking reads.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = sys::open_read_nonblocking(&path)?;
        info!(?path, "opened inbound fifo");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Zero-timeout readiness check.
    ///
    /// Reports ready on data and on hang-up, so that the following read can
    /// observe end-of-stream.
    pub fn poll_readable(&self) -> Result<bool> {
        let file = self.file.as_ref().ok_or(TransportError::Closed)?;
        sys::poll_readable(file)
    }

    /// Close the endpoint. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = ?self.path, "closed inbound fifo");
        }
    }

    /// Close and open the endpoint again.
    pub fn reopen(&mut self) -> Result<()> {
        self.close();
        self.file = Some(sys::open_read_nonblocking(&self.path)?);
        info!(path = ?self.path, "reopened inbound fifo");
        Ok(())
    }

    /// Whether the endpoint currently holds an open descriptor.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// The FIFO path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Read for InboundFifo {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.file {
            Some(file) => file.read(buf),
            None => Err(closed_io_error()),
        }
    }
}

impl Inbound for InboundFifo {
    fn poll_readable(&mut self) -> Result<bool> {
        InboundFifo::poll_readable(self)
    }

    fn reopen(&mut self) -> Result<()> {
        InboundFifo::reopen(self)
    }

    fn close(&mut self) {
        InboundFifo::close(self)
    }
}

/// Write-only, blocking FIFO endpoint.
///
/// Opening blocks until the peer has the FIFO open for reading.
#[derive(Debug)]
pub struct OutboundFifo {
    path: PathBuf,
    file: Option<File>,
}

impl OutboundFifo {
    /// Open an existing FIFO for blocking writes.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = sys::open_write_blocking(&path)?;
        info!(?path, "opened outbound fifo");
        Ok(Self {
            path,
            file: Some(file),
        })
    }

    /// Issue a single write, retrying only when interrupted by a signal.
    pub fn write_once(&mut self, buf: &[u8]) -> Result<usize> {
        let file = self.file.as_mut().ok_or(TransportError::Closed)?;
        loop {
            match file.write(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
    }

    /// Close the endpoint. Closing twice is a no-op.
    pub fn close(&mut self) {
        if self.file.take().is_some() {
            debug!(path = ?self.path, "closed outbound fifo");
        }
    }

    /// Close and open the endpoint again. Blocks until a reader is present.
    pub fn reopen(&mut self) -> Result<()> {
        self.close();
        self.file = Some(sys::open_write_blocking(&self.path)?);
        info!(path = ?self.path, "reopened outbound fifo");
        Ok(())
    }

    /// Whether the endpoint currently holds an open descriptor.
    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    /// The FIFO path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Outbound for OutboundFifo {
    fn write_once(&mut self, buf: &[u8]) -> Result<usize> {
        OutboundFifo::write_once(self, buf)
    }
}

/// Both directions of a link.
#[derive(Debug)]
pub struct FifoPair {
    pub inbound: InboundFifo,
    pub outbound: OutboundFifo,
}

impl FifoPair {
    /// Create both FIFOs if absent and open them.
    ///
    /// The inbound end is opened first. Its open returns immediately, which
    /// lets the peer's blocking outbound open complete; opening in the other
    /// order deadlocks two processes that both block on their write end.
    pub fn open(config: &FifoConfig) -> Result<Self> {
        ensure_fifo(&config.read_path, config.mode)?;
        ensure_fifo(&config.write_path, config.mode)?;

        let inbound = InboundFifo::open(&config.read_path)?;
        let outbound = OutboundFifo::open(&config.write_path)?;
        Ok(Self { inbound, outbound })
    }

    /// Close both endpoints.
    pub fn close(&mut self) {
        self.inbound.close();
        self.outbound.close();
    }
}

fn closed_io_error() -> std::io::Error {
    std::io::Error::new(ErrorKind::NotConnected, "fifo endpoint is closed")
}

#[cfg(unix)]
mod sys {
    use std::ffi::CString;
    use std::fs::{File, Metadata, OpenOptions};
    use std::io::ErrorKind;
    use std::os::fd::AsRawFd;
    use std::os::unix::ffi::OsStrExt;
    use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
    use std::path::Path;

    use crate::error::{Result, TransportError};

    pub(super) fn is_fifo(metadata: &Metadata) -> bool {
        metadata.file_type().is_fifo()
    }

    pub(super) fn mkfifo(path: &Path, mode: u32) -> Result<()> {
        let c_path =
            CString::new(path.as_os_str().as_bytes()).map_err(|_| TransportError::PathContainsNul {
                path: path.to_path_buf(),
            })?;
        // SAFETY: `c_path` is a valid NUL-terminated string that outlives the call.
        let rc = unsafe { libc::mkfifo(c_path.as_ptr(), mode as libc::mode_t) };
        if rc == 0 {
            Ok(())
        } else {
            Err(TransportError::Create {
                path: path.to_path_buf(),
                source: std::io::Error::last_os_error(),
            })
        }
    }

    pub(super) fn open_read_nonblocking(path: &Path) -> Result<File> {
        OpenOptions::new()
            .read(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })
    }

    pub(super) fn open_write_blocking(path: &Path) -> Result<File> {
        OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })
    }

    pub(super) fn poll_readable(file: &File) -> Result<bool> {
        let mut fds = libc::pollfd {
            fd: file.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        // SAFETY: `fds` is a valid, writable pollfd for the duration of the call
        // and the descriptor is kept open by the borrowed `file`.
        let rc = unsafe { libc::poll(&mut fds, 1, 0) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(false);
            }
            return Err(TransportError::Poll(err));
        }
        Ok(rc > 0 && fds.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
    }
}

#[cfg(not(unix))]
mod sys {
    use std::fs::{File, Metadata};
    use std::path::Path;

    use crate::error::{Result, TransportError};

    pub(super) fn is_fifo(_metadata: &Metadata) -> bool {
        false
    }

    pub(super) fn mkfifo(_path: &Path, _mode: u32) -> Result<()> {
        Err(TransportError::Unsupported)
    }

    pub(super) fn open_read_nonblocking(_path: &Path) -> Result<File> {
        Err(TransportError::Unsupported)
    }

    pub(super) fn open_write_blocking(_path: &Path) -> Result<File> {
        Err(TransportError::Unsupported)
    }

    pub(super) fn poll_readable(_file: &File) -> Result<bool> {
        Err(TransportError::Unsupported)
    }
}
