//! Receiver-side frame reassembly.
//!
//! Waits for a frame header packet, then collects exactly
//! `total_len` payload bytes from the packets that follow. Anything
//! received while idle that does not parse as a header is dropped.

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::StreamError;
use crate::header::{EncodingType, HEADER_LENGTH, WireFrameHeader};
use crate::packet::LinkPacket;
use crate::route::Channel;

/// A complete frame as seen by the receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedFrame {
    pub header: WireFrameHeader,
    pub payload: Bytes,
}

impl ReceivedFrame {
    pub fn encoding(&self) -> EncodingType {
        self.header.encoding
    }
}

#[derive(Debug, Default)]
pub struct FrameAssembler {
    current: Option<(WireFrameHeader, BytesMut)>,
    completed: u64,
    dropped: u64,
}

impl FrameAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one link packet. Packets not addressed to a data channel
    /// are ignored.
    pub fn push_packet(&mut self, packet: &LinkPacket) -> Result<Option<ReceivedFrame>, StreamError> {
        if packet.dst().channel != Channel::Data {
            return Ok(None);
        }
        self.push(packet.payload())
    }

    /// Feed one packet payload.
    ///
    /// Returns the frame once its last byte arrives. A chunk that runs
    /// past the declared length discards the partial frame and returns
    /// [`StreamError::FrameOverrun`].
    pub fn push(&mut self, chunk: &[u8]) -> Result<Option<ReceivedFrame>, StreamError> {
        let Some((header, buf)) = self.current.as_mut() else {
            return Ok(self.start(chunk));
        };

        let declared = header.total_len as usize;
        let received = buf.len() + chunk.len();
        if received > declared {
            self.current = None;
            self.dropped += 1;
            return Err(StreamError::FrameOverrun { received, declared });
        }

        buf.extend_from_slice(chunk);
        if received == declared {
            return Ok(self.finish());
        }
        Ok(None)
    }

    /// `true` while a header has been seen and payload is outstanding.
    pub fn in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// Payload bytes still expected for the current frame.
    pub fn remaining(&self) -> usize {
        self.current
            .as_ref()
            .map_or(0, |(h, buf)| h.total_len as usize - buf.len())
    }

    pub fn frames_completed(&self) -> u64 {
        self.completed
    }

    pub fn frames_dropped(&self) -> u64 {
        self.dropped
    }

    /// Forget any partial frame.
    pub fn reset(&mut self) {
        if self.current.take().is_some() {
            self.dropped += 1;
        }
    }

    fn start(&mut self, chunk: &[u8]) -> Option<ReceivedFrame> {
        if chunk.len() != HEADER_LENGTH {
            trace!(len = chunk.len(), "dropping packet while waiting for header");
            return None;
        }
        let header = match WireFrameHeader::from_bytes(chunk) {
            Ok(h) => h,
            Err(e) => {
                trace!("dropping packet while waiting for header: {e}");
                return None;
            }
        };
        trace!(
            width = header.width,
            height = header.height,
            total = header.total_len,
            "frame header"
        );
        self.current = Some((header, BytesMut::with_capacity(header.total_len as usize)));
        if header.total_len == 0 {
            return self.finish();
        }
        None
    }

    fn finish(&mut self) -> Option<ReceivedFrame> {
        let (header, buf) = self.current.take()?;
        self.completed += 1;
        Some(ReceivedFrame {
            header,
            payload: buf.freeze(),
        })
    }
}
