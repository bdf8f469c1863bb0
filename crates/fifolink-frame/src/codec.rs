use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Largest payload a 2-byte length header can describe.
pub const MAX_PAYLOAD_U16: usize = u16::MAX as usize;

/// Largest payload a 1-byte length header can describe.
pub const MAX_PAYLOAD_U8: usize = u8::MAX as usize;

/// Terminator used by [`FrameEncoding::delimited`]: the NUL byte.
pub const DEFAULT_TERMINATOR: u8 = 0x00;

/// Bytes requested from the transport per poll cycle.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 2048;

/// Default bound on undelivered bytes held by a reassembler: 16 MiB.
pub const DEFAULT_MAX_BUFFERED: usize = 16 * 1024 * 1024;

/// Wire encoding of a frame.
///
/// The variants are separate protocols: both ends of a link must agree on
/// one, and frames of one variant are meaningless to the others.
///
/// ```text
/// LengthU16   ┌────────────────┬──────────────────┐
///             │ Length (2B BE) │ Payload          │
///             └────────────────┴──────────────────┘
/// LengthU8    ┌────────────┬──────────────────────┐
///             │ Length (1B)│ Payload              │
///             └────────────┴──────────────────────┘
/// Delimited   ┌──────────────────────┬────────────┐
///             │ Payload              │ Terminator │
///             └──────────────────────┴────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FrameEncoding {
    /// 2-byte big-endian unsigned length header.
    #[default]
    LengthU16,
    /// 1-byte unsigned length header.
    LengthU8,
    /// No header; each payload is followed by `terminator`, which must not
    /// occur inside a payload.
    Delimited { terminator: u8 },
}

impl FrameEncoding {
    /// Delimited encoding with the NUL terminator.
    pub const fn delimited() -> Self {
        Self::Delimited {
            terminator: DEFAULT_TERMINATOR,
        }
    }

    /// Width of the length header in bytes (0 for the delimited encoding).
    pub const fn header_width(self) -> usize {
        match self {
            Self::LengthU16 => 2,
            Self::LengthU8 => 1,
            Self::Delimited { .. } => 0,
        }
    }

    /// Largest encodable payload, `None` when unbounded.
    pub const fn max_payload(self) -> Option<usize> {
        match self {
            Self::LengthU16 => Some(MAX_PAYLOAD_U16),
            Self::LengthU8 => Some(MAX_PAYLOAD_U8),
            Self::Delimited { .. } => None,
        }
    }

    pub const fn is_length_prefixed(self) -> bool {
        !matches!(self, Self::Delimited { .. })
    }

    /// Total wire size of a frame carrying `payload_len` bytes.
    pub const fn wire_size(self, payload_len: usize) -> usize {
        match self {
            Self::Delimited { .. } => payload_len + 1,
            _ => self.header_width() + payload_len,
        }
    }

    /// Check that `payload` can be carried by this encoding.
    pub fn validate(self, payload: &[u8]) -> Result<()> {
        match self {
            Self::Delimited { terminator } => {
                match payload.iter().position(|&b| b == terminator) {
                    Some(offset) => Err(FrameError::DelimiterInPayload { offset }),
                    None => Ok(()),
                }
            }
            _ => match self.max_payload() {
                Some(max) if payload.len() > max => Err(FrameError::PayloadTooLarge {
                    size: payload.len(),
                    max,
                }),
                _ => Ok(()),
            },
        }
    }

    /// Append the wire form of `payload` to `dst`.
    ///
    /// Nothing is written to `dst` when the payload is rejected.
    pub fn encode(self, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
        self.validate(payload)?;
        dst.reserve(self.wire_size(payload.len()));
        match self {
            Self::LengthU16 => {
                dst.put_u16(payload.len() as u16);
                dst.put_slice(payload);
            }
            Self::LengthU8 => {
                dst.put_u8(payload.len() as u8);
                dst.put_slice(payload);
            }
            Self::Delimited { terminator } => {
                dst.put_slice(payload);
                dst.put_u8(terminator);
            }
        }
        Ok(())
    }

    /// Encode `payload` into a standalone [`Frame`].
    pub fn frame(self, payload: &[u8]) -> Result<Frame> {
        let mut buf = BytesMut::with_capacity(self.wire_size(payload.len()));
        self.encode(payload, &mut buf)?;
        Ok(Frame {
            encoding: self,
            bytes: buf.freeze(),
        })
    }

    /// Wire bytes of one frame carrying `payload`.
    pub fn encode_to_bytes(self, payload: &[u8]) -> Result<Bytes> {
        self.frame(payload).map(Frame::into_bytes)
    }

    /// Consume a length header from the front of `src`.
    ///
    /// Returns `None`, leaving `src` untouched, while fewer than
    /// [`header_width`](Self::header_width) bytes are buffered, and always
    /// for the delimited encoding.
    pub(crate) fn take_header(self, src: &mut BytesMut) -> Option<usize> {
        if !self.is_length_prefixed() || src.len() < self.header_width() {
            return None;
        }
        match self {
            Self::LengthU16 => Some(src.get_u16() as usize),
            Self::LengthU8 => Some(src.get_u8() as usize),
            Self::Delimited { .. } => None,
        }
    }
}

/// One encoded frame, ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    encoding: FrameEncoding,
    bytes: Bytes,
}

impl Frame {
    /// The encoding this frame was built with.
    pub fn encoding(&self) -> FrameEncoding {
        self.encoding
    }

    /// The complete wire bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Bytes {
        self.bytes
    }

    /// The payload carried by this frame.
    pub fn payload(&self) -> &[u8] {
        match self.encoding {
            FrameEncoding::Delimited { .. } => &self.bytes[..self.bytes.len() - 1],
            encoding => &self.bytes[encoding.header_width()..],
        }
    }

    /// The total wire size of this frame.
    pub fn wire_size(&self) -> usize {
        self.bytes.len()
    }
}

/// Configuration for framing and reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    /// Wire encoding. Default: 2-byte big-endian length header.
    pub encoding: FrameEncoding,
    /// Maximum bytes read from the transport per poll cycle. Default: 2048.
    pub read_chunk_size: usize,
    /// Maximum undelivered bytes a reassembler may hold. Default: 16 MiB.
    pub max_buffered_bytes: usize,
}

impl FrameConfig {
    /// Default configuration with a specific encoding.
    pub fn with_encoding(encoding: FrameEncoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            encoding: FrameEncoding::default(),
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            max_buffered_bytes: DEFAULT_MAX_BUFFERED,
        }
    }
}
