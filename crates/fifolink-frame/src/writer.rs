use bytes::BytesMut;
use fifolink_transport::Outbound;
use tracing::{debug, warn};

use crate::codec::{Frame, FrameEncoding};
use crate::error::Result;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Outcome of a [`Framer::send`].
///
/// A pipe write can partially succeed, so the count the OS accepted is
/// reported next to the frame size instead of being hidden.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Bytes the transport accepted.
    pub written: usize,
    /// Wire size of the frame.
    pub requested: usize,
}

impl SendReport {
    /// True when the whole frame was written.
    pub fn is_complete(&self) -> bool {
        self.written >= self.requested
    }

    /// Bytes of the frame that were not written.
    pub fn remaining(&self) -> usize {
        self.requested.saturating_sub(self.written)
    }
}

/// Encodes messages and writes each frame with a single transport write.
#[derive(Debug)]
pub struct Framer {
    encoding: FrameEncoding,
    buf: BytesMut,
}

impl Framer {
    pub fn new(encoding: FrameEncoding) -> Self {
        Self {
            encoding,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    pub fn encoding(&self) -> FrameEncoding {
        self.encoding
    }

    /// Encode `payload` without sending it.
    pub fn encode(&self, payload: &[u8]) -> Result<Frame> {
        self.encoding.frame(payload)
    }

    /// Encode `payload` and write the frame to `outbound` in one write.
    ///
    /// Rejected payloads are never written. Short writes are not retried;
    /// check [`SendReport::is_complete`].
    pub fn send<O>(&mut self, outbound: &mut O, payload: &[u8]) -> Result<SendReport>
    where
        O: Outbound + ?Sized,
    {
        self.buf.clear();
        self.encoding.encode(payload, &mut self.buf)?;

        let requested = self.buf.len();
        let written = outbound.write_once(&self.buf)?;
        let report = SendReport { written, requested };

        if report.is_complete() {
            debug!(bytes = written, payload = payload.len(), "sent frame");
        } else {
            warn!(written, requested, "short write on outbound endpoint");
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::io::ErrorKind;

    use bytes::Bytes;
    use fifolink_transport::TransportError;

    use super::*;
    use crate::error::FrameError;
    use crate::reassembler::Reassembler;

    #[derive(Default)]
    struct RecordingOutbound {
        writes: Vec<Vec<u8>>,
    }

    impl Outbound for RecordingOutbound {
        fn write_once(&mut self, buf: &[u8]) -> fifolink_transport::Result<usize> {
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }
    }

    struct ShortOutbound {
        limit: usize,
    }

    impl Outbound for ShortOutbound {
        fn write_once(&mut self, buf: &[u8]) -> fifolink_transport::Result<usize> {
            Ok(buf.len().min(self.limit))
        }
    }

    struct BrokenOutbound;

    impl Outbound for BrokenOutbound {
        fn write_once(&mut self, _buf: &[u8]) -> fifolink_transport::Result<usize> {
            Err(TransportError::Io(std::io::Error::from(ErrorKind::BrokenPipe)))
        }
    }

    #[test]
    fn send_writes_frame_in_one_write() {
        let mut outbound = RecordingOutbound::default();
        let mut framer = Framer::new(FrameEncoding::LengthU16);

        let report = framer.send(&mut outbound, b"hi").unwrap();

        assert_eq!(
            report,
            SendReport {
                written: 4,
                requested: 4
            }
        );
        assert!(report.is_complete());
        assert_eq!(outbound.writes, vec![vec![0x00, 0x02, 0x68, 0x69]]);
    }

    #[test]
    fn send_reuses_buffer_between_frames() {
        let mut outbound = RecordingOutbound::default();
        let mut framer = Framer::new(FrameEncoding::LengthU8);

        framer.send(&mut outbound, b"one").unwrap();
        framer.send(&mut outbound, b"two").unwrap();

        assert_eq!(
            outbound.writes,
            vec![b"\x03one".to_vec(), b"\x03two".to_vec()]
        );
    }

    #[test]
    fn short_write_is_reported() {
        let mut framer = Framer::new(FrameEncoding::LengthU16);
        let report = framer
            .send(&mut ShortOutbound { limit: 3 }, b"payload")
            .unwrap();

        assert!(!report.is_complete());
        assert_eq!(report.written, 3);
        assert_eq!(report.requested, 9);
        assert_eq!(report.remaining(), 6);
    }

    #[test]
    fn oversized_payload_is_not_written() {
        let mut outbound = RecordingOutbound::default();
        let mut framer = Framer::new(FrameEncoding::LengthU8);

        let err = framer.send(&mut outbound, &[0u8; 256]).unwrap_err();
        assert!(matches!(
            err,
            FrameError::PayloadTooLarge { size: 256, max: 255 }
        ));
        assert!(outbound.writes.is_empty());

        framer.send(&mut outbound, &[0u8; 255]).unwrap();
        assert_eq!(outbound.writes[0].len(), 256);
    }

    #[test]
    fn delimited_payload_with_terminator_is_not_written() {
        let mut outbound = RecordingOutbound::default();
        let mut framer = Framer::new(FrameEncoding::delimited());

        let err = framer.send(&mut outbound, b"a\0b").unwrap_err();
        assert!(matches!(err, FrameError::DelimiterInPayload { offset: 1 }));
        assert!(outbound.writes.is_empty());

        framer.send(&mut outbound, b"HELLO FROM C!!!!!").unwrap();
        assert_eq!(outbound.writes[0], b"HELLO FROM C!!!!!\0".to_vec());
    }

    #[test]
    fn transport_failure_propagates() {
        let mut framer = Framer::new(FrameEncoding::LengthU16);
        let err = framer.send(&mut BrokenOutbound, b"x").unwrap_err();
        assert!(matches!(
            err,
            FrameError::Transport(TransportError::Io(e)) if e.kind() == ErrorKind::BrokenPipe
        ));
    }

    #[test]
    fn encode_matches_sent_bytes() {
        let mut outbound = RecordingOutbound::default();
        let mut framer = Framer::new(FrameEncoding::LengthU16);

        let frame = framer.encode(b"same").unwrap();
        framer.send(&mut outbound, b"same").unwrap();

        assert_eq!(frame.as_bytes(), outbound.writes[0].as_slice());
        assert_eq!(frame.encoding(), framer.encoding());
    }

    #[test]
    fn framed_output_reassembles() {
        for encoding in [
            FrameEncoding::LengthU16,
            FrameEncoding::LengthU8,
            FrameEncoding::delimited(),
        ] {
            let mut outbound = RecordingOutbound::default();
            let mut framer = Framer::new(encoding);
            framer.send(&mut outbound, b"first").unwrap();
            framer.send(&mut outbound, b"second").unwrap();

            let mut reassembler = Reassembler::new(encoding);
            let mut received = Vec::new();
            for write in &outbound.writes {
                reassembler
                    .feed(write, &mut |_: usize, payload: Bytes| {
                        received.push(payload.to_vec())
                    })
                    .unwrap();
            }
            assert_eq!(received, vec![b"first".to_vec(), b"second".to_vec()]);
        }
    }
}
