//! Frame compression seam and the preallocated payload it fills.
//!
//! A compressed image goes out as three regions:
//!
//! ```text
//! header ‖ body ‖ footer
//! ```
//!
//! `header` and `footer` depend only on encoder configuration and are
//! produced once by [`CompressedPayload::open`]. `body` is re-encoded
//! every cycle into a buffer of fixed capacity.

use tracing::info;

use crate::error::StreamError;
use crate::stream::types::Frame;

// ── FrameEncoder ─────────────────────────────────────────────────

/// A synchronous image encoder that can emit its stream in three parts.
pub trait FrameEncoder: Send {
    /// Bytes that precede every encoded body.
    fn emit_header(&mut self) -> Result<Vec<u8>, StreamError>;

    /// Bytes that follow every encoded body.
    fn emit_footer(&mut self) -> Result<Vec<u8>, StreamError>;

    /// Append the encoded body of `frame` to `body`.
    fn encode(&mut self, frame: &Frame, body: &mut Vec<u8>) -> Result<(), StreamError>;
}

impl<E: FrameEncoder + ?Sized> FrameEncoder for Box<E> {
    fn emit_header(&mut self) -> Result<Vec<u8>, StreamError> {
        (**self).emit_header()
    }

    fn emit_footer(&mut self) -> Result<Vec<u8>, StreamError> {
        (**self).emit_footer()
    }

    fn encode(&mut self, frame: &Frame, body: &mut Vec<u8>) -> Result<(), StreamError> {
        (**self).encode(frame, body)
    }
}

// ── PayloadCapacity ──────────────────────────────────────────────

/// Preallocated sizes for each payload region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadCapacity {
    pub header: usize,
    pub footer: usize,
    pub body: usize,
}

impl Default for PayloadCapacity {
    fn default() -> Self {
        Self {
            header: 1024,
            footer: 10,
            body: 15 * 1024,
        }
    }
}

// ── CompressedPayload ────────────────────────────────────────────

/// An opened encoder plus its header, footer and body buffers.
pub struct CompressedPayload<E> {
    encoder: E,
    capacity: PayloadCapacity,
    header: Vec<u8>,
    footer: Vec<u8>,
    body: Vec<u8>,
}

impl<E: FrameEncoder> CompressedPayload<E> {
    /// Produce the fixed header and footer.
    ///
    /// Any failure here is an initialization error: the encoder is
    /// unusable and the pipeline must not start.
    pub fn open(mut encoder: E, capacity: PayloadCapacity) -> Result<Self, StreamError> {
        let header = encoder.emit_header()?;
        check_capacity("header", header.len(), capacity.header)?;
        info!("encoded header size is {}", header.len());

        let footer = encoder.emit_footer()?;
        check_capacity("footer", footer.len(), capacity.footer)?;
        info!("encoded footer size is {}", footer.len());

        Ok(Self {
            encoder,
            capacity,
            header,
            footer,
            body: Vec::with_capacity(capacity.body),
        })
    }

    /// Encode `frame` into the body buffer and return the total
    /// payload length.
    ///
    /// A body larger than its capacity is discarded and reported as
    /// [`StreamError::CapacityExceeded`].
    pub fn encode(&mut self, frame: &Frame) -> Result<usize, StreamError> {
        self.body.clear();
        let result = self
            .encoder
            .encode(frame, &mut self.body)
            .and_then(|()| check_capacity("body", self.body.len(), self.capacity.body));
        if let Err(e) = result {
            self.body.clear();
            return Err(e);
        }
        Ok(self.total_len())
    }

    pub fn header(&self) -> &[u8] {
        &self.header
    }

    pub fn footer(&self) -> &[u8] {
        &self.footer
    }

    /// Body from the most recent successful [`encode`](Self::encode).
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// `header ‖ body ‖ footer`, in send order.
    pub fn regions(&self) -> [&[u8]; 3] {
        [&self.header, &self.body, &self.footer]
    }

    pub fn total_len(&self) -> usize {
        self.header.len() + self.body.len() + self.footer.len()
    }
}

fn check_capacity(region: &'static str, size: usize, capacity: usize) -> Result<(), StreamError> {
    if size > capacity {
        return Err(StreamError::CapacityExceeded {
            region,
            size,
            capacity,
        });
    }
    Ok(())
}
