//! # framelink-core
//!
//! Host-side camera streaming over a packetized chip-to-chip link.
//!
//! This crate contains:
//! - **Link**: `LinkPacket`, `Route`, `LinkCodec` for framed I/O via `tokio_util`,
//!   and `LinkConnection` with background reader/writer tasks
//! - **Control**: status messages, `LinkStatusMonitor` and `ProvisioningSequencer`
//! - **State**: the single-writer `LinkStateWriter` / `LinkStateReader` pair
//! - **Stream**: capture, encoding, fragmentation, the transport pipeline and
//!   the receiver-side `FrameAssembler`
//! - **Error**: `StreamError`, a `thiserror`-based error type

pub mod codec;
pub mod control;
pub mod error;
pub mod header;
pub mod message;
pub mod network;
pub mod packet;
pub mod route;
pub mod state;
pub mod stream;

// ── Re-exports for ergonomic usage ───────────────────────────────

pub use codec::LinkCodec;
pub use control::{Credentials, LinkStatusMonitor, MonitorStats, ProvisioningSequencer};
pub use error::StreamError;
pub use header::{EncodingType, FRAME_MAGIC, HEADER_LENGTH, WireFrameHeader};
pub use message::{CommandCode, ControlCommand, StatusMessage};
pub use network::{LinkConnection, LinkReceiver, LinkSender};
pub use packet::{LinkPacket, MAX_FRAME_SIZE, PACKET_DATA_CAPACITY};
pub use route::{Channel, Chip, Route};
pub use state::{LinkSnapshot, LinkStateReader, LinkStateWriter, link_state};

// ── Streaming re-exports ─────────────────────────────────────────
pub use stream::{
    CaptureSource, CompressedPayload, Frame, FrameAssembler, FrameEncoder,
    FrameTransportPipeline, JpegFrameEncoder, PayloadCapacity, PipelineConfig, PipelineStats,
    ReceivedFrame, SyntheticCapture,
};
