use crate::error::StreamError;

/// First byte of every image record.
pub const FRAME_MAGIC: u8 = 0xBC;

/// Encoded size of [`WireFrameHeader`].
pub const HEADER_LENGTH: usize = 11;

pub type WireFrameHeaderBytes = [u8; HEADER_LENGTH];

/// Wire encoding of the payload that follows a header.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncodingType {
    /// Raw 8-bit grayscale pixels, row-major.
    Raw = 0,
    /// JPEG stream: header ‖ scan ‖ footer.
    Jpeg = 1,
}

impl TryFrom<u8> for EncodingType {
    type Error = StreamError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(EncodingType::Raw),
            1 => Ok(EncodingType::Jpeg),
            _ => Err(StreamError::UnknownVariant {
                type_name: "EncodingType",
                value: value as u64,
            }),
        }
    }
}

/// Image record header sent ahead of every frame's payload.
///
/// Layout (packed, little-endian):
/// ```text
/// magic:   u8   0xBC
/// width:   u16
/// height:  u16
/// depth:   u8   bytes per pixel
/// type:    u8   EncodingType
/// size:    u32  payload bytes that follow
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireFrameHeader {
    pub width: u16,
    pub height: u16,
    pub depth: u8,
    pub encoding: EncodingType,
    pub total_len: u32,
}

impl WireFrameHeader {
    pub fn new(width: u16, height: u16, encoding: EncodingType, total_len: u32) -> Self {
        Self {
            width,
            height,
            depth: 1,
            encoding,
            total_len,
        }
    }

    pub fn to_bytes(&self) -> WireFrameHeaderBytes {
        let mut buf: WireFrameHeaderBytes = [0; HEADER_LENGTH];
        buf[0] = FRAME_MAGIC;
        buf[1..3].copy_from_slice(&self.width.to_le_bytes());
        buf[3..5].copy_from_slice(&self.height.to_le_bytes());
        buf[5] = self.depth;
        buf[6] = self.encoding as u8;
        buf[7..11].copy_from_slice(&self.total_len.to_le_bytes());
        buf
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, StreamError> {
        let bytes: &WireFrameHeaderBytes = bytes.try_into().map_err(|_| {
            StreamError::InvalidPacketLength {
                expected: HEADER_LENGTH,
                actual: bytes.len(),
            }
        })?;
        if bytes[0] != FRAME_MAGIC {
            return Err(StreamError::InvalidMagic {
                expected: FRAME_MAGIC,
                actual: bytes[0],
            });
        }
        Ok(Self {
            width: u16::from_le_bytes([bytes[1], bytes[2]]),
            height: u16::from_le_bytes([bytes[3], bytes[4]]),
            depth: bytes[5],
            encoding: EncodingType::try_from(bytes[6])?,
            total_len: u32::from_le_bytes([bytes[7], bytes[8], bytes[9], bytes[10]]),
        })
    }
}
