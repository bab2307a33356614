//! Domain-specific error types for the framelink pipeline.
//!
//! All fallible operations return `Result<T, StreamError>`.
//! Errors are split by how far they are allowed to travel: per-cycle
//! failures stay inside the pipeline loop, everything else is fatal
//! for the task that hit it.

use std::time::Duration;
use thiserror::Error;

/// The canonical error type for framelink.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Protocol Errors ──────────────────────────────────────────
    /// A wire frame header did not start with the expected magic byte.
    #[error("invalid magic byte: expected {expected:#04x}, got {actual:#04x}")]
    InvalidMagic { expected: u8, actual: u8 },

    /// A numeric value did not map to any known enum variant.
    #[error("unknown {type_name} discriminant: {value:#x}")]
    UnknownVariant { type_name: &'static str, value: u64 },

    /// A packet violated protocol rules.
    #[error("protocol violation: {0}")]
    ProtocolViolation(&'static str),

    // ── Packet Errors ────────────────────────────────────────────
    /// The payload does not fit in a single link packet.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The received bytes are shorter or longer than expected.
    #[error("invalid packet length: expected {expected}, got {actual}")]
    InvalidPacketLength { expected: usize, actual: usize },

    /// More payload bytes arrived than the frame header declared.
    #[error("frame overrun: {received} bytes received, {declared} declared")]
    FrameOverrun { received: usize, declared: usize },

    // ── Link Errors ──────────────────────────────────────────────
    /// The underlying byte stream reported an error.
    #[error("link error: {0}")]
    Link(#[from] std::io::Error),

    /// The link channel was closed unexpectedly.
    #[error("link closed")]
    LinkClosed,

    // ── Capture / Encode Errors ──────────────────────────────────
    /// The capture source reported a failed capture.
    #[error("capture failed: {0}")]
    CaptureFailed(String),

    /// The capture completion handle was dropped without completing.
    #[error("capture abandoned by source")]
    CaptureAbandoned,

    /// A capture was started while another one was still outstanding.
    #[error("capture already in flight")]
    CaptureInFlight,

    /// No capture completion arrived within the deadline.
    #[error("capture timed out after {0:?}")]
    CaptureTimeout(Duration),

    /// Encoding a frame failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// An encoded region does not fit in its preallocated buffer.
    #[error("{region} exceeds capacity: {size} bytes (capacity {capacity})")]
    CapacityExceeded {
        region: &'static str,
        size: usize,
        capacity: usize,
    },

    // ── Configuration Errors ─────────────────────────────────────
    /// A credential could not be carried in a control packet.
    #[error("invalid credential: {0}")]
    InvalidCredential(&'static str),
}

impl StreamError {
    /// Returns `true` for failures that only invalidate the current
    /// capture cycle. The pipeline skips the frame and keeps running.
    pub fn is_cycle_error(&self) -> bool {
        matches!(
            self,
            StreamError::CaptureFailed(_)
                | StreamError::CaptureAbandoned
                | StreamError::CaptureTimeout(_)
                | StreamError::Encoding(_)
                | StreamError::CapacityExceeded { .. }
        )
    }
}

// ── Convenient From implementations ──────────────────────────────

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for StreamError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        StreamError::LinkClosed
    }
}

impl From<image::ImageError> for StreamError {
    fn from(e: image::ImageError) -> Self {
        StreamError::Encoding(e.to_string())
    }
}
