//! The atomic link transport unit.

use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::StreamError;
use crate::route::Route;

/// Payload bytes carried by one link packet.
pub const PACKET_DATA_CAPACITY: usize = 28;

/// Bytes preceding the payload on the wire: `len:u16 | dst:u8 | src:u8`.
pub const PACKET_OVERHEAD: usize = 4;

/// Largest encoded packet.
pub const MAX_FRAME_SIZE: usize = PACKET_OVERHEAD + PACKET_DATA_CAPACITY;

/// Route bytes counted by the wire length field.
const ROUTE_BYTES: usize = 2;

/// One routed packet. `data.len()` never exceeds [`PACKET_DATA_CAPACITY`].
#[derive(Clone, PartialEq, Eq)]
pub struct LinkPacket {
    dst: Route,
    src: Route,
    data: Bytes,
}

impl LinkPacket {
    pub fn new(src: Route, dst: Route, data: impl Into<Bytes>) -> Result<Self, StreamError> {
        let data = data.into();
        if data.len() > PACKET_DATA_CAPACITY {
            return Err(StreamError::PayloadTooLarge {
                size: data.len(),
                max: PACKET_DATA_CAPACITY,
            });
        }
        Ok(Self { dst, src, data })
    }

    /// Copy `chunk` into a new packet.
    pub fn from_slice(src: Route, dst: Route, chunk: &[u8]) -> Result<Self, StreamError> {
        Self::new(src, dst, Bytes::copy_from_slice(chunk))
    }

    pub fn dst(&self) -> Route {
        self.dst
    }

    pub fn src(&self) -> Route {
        self.src
    }

    pub fn payload(&self) -> &[u8] {
        &self.data
    }

    /// Declared payload length.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Append the wire form to `dst`.
    pub fn encode_into(&self, buf: &mut BytesMut) {
        buf.reserve(PACKET_OVERHEAD + self.data.len());
        buf.put_u16_le((self.data.len() + ROUTE_BYTES) as u16);
        buf.put_u8(self.dst.to_byte());
        buf.put_u8(self.src.to_byte());
        buf.put_slice(&self.data);
    }

    /// Parse a complete wire frame. `bytes` must hold exactly one packet.
    pub fn decode(bytes: &[u8]) -> Result<Self, StreamError> {
        if bytes.len() < PACKET_OVERHEAD {
            return Err(StreamError::InvalidPacketLength {
                expected: PACKET_OVERHEAD,
                actual: bytes.len(),
            });
        }
        let mut cursor = bytes;
        let wire_len = cursor.get_u16_le() as usize;
        if wire_len < ROUTE_BYTES {
            return Err(StreamError::ProtocolViolation(
                "length field smaller than route header",
            ));
        }
        let data_len = wire_len - ROUTE_BYTES;
        if data_len > PACKET_DATA_CAPACITY {
            return Err(StreamError::PayloadTooLarge {
                size: data_len,
                max: PACKET_DATA_CAPACITY,
            });
        }
        if bytes.len() != PACKET_OVERHEAD + data_len {
            return Err(StreamError::InvalidPacketLength {
                expected: PACKET_OVERHEAD + data_len,
                actual: bytes.len(),
            });
        }
        let dst = Route::from_byte(cursor.get_u8())?;
        let src = Route::from_byte(cursor.get_u8())?;
        Ok(Self {
            dst,
            src,
            data: Bytes::copy_from_slice(cursor),
        })
    }

    /// Total wire size of a packet whose length field reads `wire_len`.
    pub(crate) fn frame_size(wire_len: u16) -> usize {
        PACKET_OVERHEAD - ROUTE_BYTES + wire_len as usize
    }
}

impl fmt::Debug for LinkPacket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LinkPacket")
            .field("src", &self.src)
            .field("dst", &self.dst)
            .field("len", &self.data.len())
            .finish()
    }
}
