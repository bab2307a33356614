//! Grayscale baseline JPEG encoder split into header, scan and footer.
//!
//! The `image` encoder writes a complete JFIF stream. For a fixed size
//! and quality every marker segment before the scan is identical from
//! frame to frame, so the stream is cut at the end of the SOS segment
//! and before the EOI marker:
//!
//! ```text
//! SOI APP0 DQT SOF0 DHT.. SOS │ entropy-coded scan │ EOI
//! ───────── header ────────── │ ────── body ────── │ footer
//! ```

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::error::StreamError;
use crate::stream::encoder::FrameEncoder;
use crate::stream::types::Frame;

const MARKER_SOI: u8 = 0xD8;
const MARKER_SOS: u8 = 0xDA;
const MARKER_EOI: u8 = 0xD9;

/// Quality used when the configuration does not set one.
pub const DEFAULT_JPEG_QUALITY: u8 = 75;

pub struct JpegFrameEncoder {
    width: u16,
    height: u16,
    quality: u8,
    header: Option<Vec<u8>>,
    scratch: Vec<u8>,
}

impl JpegFrameEncoder {
    /// `quality` is clamped to `1..=100`.
    pub fn new(width: u16, height: u16, quality: u8) -> Self {
        Self {
            width,
            height,
            quality: quality.clamp(1, 100),
            header: None,
            scratch: Vec::new(),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    fn encode_stream(&mut self, pixels: &[u8]) -> Result<(), StreamError> {
        self.scratch.clear();
        let mut encoder = JpegEncoder::new_with_quality(&mut self.scratch, self.quality);
        encoder.encode(
            pixels,
            self.width as u32,
            self.height as u32,
            ExtendedColorType::L8,
        )?;
        Ok(())
    }

    /// Header bytes, computed from a blank frame on first use.
    fn cached_header(&mut self) -> Result<&[u8], StreamError> {
        if self.header.is_none() {
            let blank = vec![0u8; self.width as usize * self.height as usize];
            self.encode_stream(&blank)?;
            let split = split_stream(&self.scratch)?;
            self.header = Some(self.scratch[..split.header_end].to_vec());
        }
        Ok(self.header.as_deref().unwrap_or_default())
    }
}

impl FrameEncoder for JpegFrameEncoder {
    fn emit_header(&mut self) -> Result<Vec<u8>, StreamError> {
        Ok(self.cached_header()?.to_vec())
    }

    fn emit_footer(&mut self) -> Result<Vec<u8>, StreamError> {
        Ok(vec![0xFF, MARKER_EOI])
    }

    fn encode(&mut self, frame: &Frame, body: &mut Vec<u8>) -> Result<(), StreamError> {
        if frame.width() != self.width || frame.height() != self.height {
            return Err(StreamError::Encoding(format!(
                "frame is {}x{}, encoder configured for {}x{}",
                frame.width(),
                frame.height(),
                self.width,
                self.height
            )));
        }
        let header_len = self.cached_header()?.len();

        self.encode_stream(frame.data())?;
        let split = split_stream(&self.scratch)?;
        let header = self.header.as_deref().unwrap_or_default();
        if split.header_end != header_len || self.scratch[..header_len] != *header {
            return Err(StreamError::Encoding(
                "encoder emitted a header that differs from the startup header".into(),
            ));
        }

        body.extend_from_slice(&self.scratch[split.header_end..split.footer_start]);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StreamSplit {
    /// One past the last byte of the SOS segment.
    header_end: usize,
    /// Offset of the trailing EOI marker.
    footer_start: usize,
}

/// Locate the scan inside a complete JPEG stream.
fn split_stream(stream: &[u8]) -> Result<StreamSplit, StreamError> {
    let malformed = |what: &str| StreamError::Encoding(format!("malformed jpeg stream: {what}"));

    if stream.len() < 4 || stream[0] != 0xFF || stream[1] != MARKER_SOI {
        return Err(malformed("missing SOI"));
    }
    let footer_start = stream.len() - 2;
    if stream[footer_start] != 0xFF || stream[footer_start + 1] != MARKER_EOI {
        return Err(malformed("missing EOI"));
    }

    let mut pos = 2;
    loop {
        if pos + 4 > footer_start {
            return Err(malformed("no SOS segment"));
        }
        if stream[pos] != 0xFF {
            return Err(malformed("expected marker"));
        }
        let marker = stream[pos + 1];
        if marker == 0xFF {
            // fill byte
            pos += 1;
            continue;
        }
        let len = u16::from_be_bytes([stream[pos + 2], stream[pos + 3]]) as usize;
        let end = pos + 2 + len;
        if len < 2 || end > footer_start {
            return Err(malformed("segment overruns stream"));
        }
        if marker == MARKER_SOS {
            return Ok(StreamSplit {
                header_end: end,
                footer_start,
            });
        }
        pos = end;
    }
}
