//! `tokio_util` codec for link packets over a byte stream.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::StreamError;
use crate::packet::{LinkPacket, MAX_FRAME_SIZE};

#[derive(Debug, Default, Clone, Copy)]
pub struct LinkCodec;

impl Decoder for LinkCodec {
    type Item = LinkPacket;
    type Error = StreamError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < 2 {
            return Ok(None);
        }
        let wire_len = u16::from_le_bytes([src[0], src[1]]);
        let frame_size = LinkPacket::frame_size(wire_len);
        if frame_size > MAX_FRAME_SIZE {
            return Err(StreamError::PayloadTooLarge {
                size: frame_size,
                max: MAX_FRAME_SIZE,
            });
        }
        if src.len() < frame_size {
            src.reserve(frame_size - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_size);
        LinkPacket::decode(&frame).map(Some)
    }
}

impl Encoder<LinkPacket> for LinkCodec {
    type Error = StreamError;

    fn encode(&mut self, item: LinkPacket, dst: &mut BytesMut) -> Result<(), Self::Error> {
        item.encode_into(dst);
        Ok(())
    }
}
