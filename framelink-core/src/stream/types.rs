//! Shared frame types used between pipeline stages.
//!
//! These are in-memory representations. The wire record that
//! describes a frame to the receiver is [`crate::header::WireFrameHeader`].

// ── Frame ────────────────────────────────────────────────────────

/// An 8-bit grayscale image, one byte per pixel, rows packed with no
/// padding.
///
/// The pipeline owns exactly one of these and reuses it every cycle.
#[derive(Clone, PartialEq, Eq)]
pub struct Frame {
    width: u16,
    height: u16,
    data: Vec<u8>,
}

impl Frame {
    /// Allocate a zeroed frame.
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            data: vec![0; width as usize * height as usize],
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Total byte size of the pixel buffer, `width * height`.
    pub fn byte_len(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("len", &self.data.len())
            .finish()
    }
}
