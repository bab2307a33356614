//! # Frame streaming
//!
//! Everything between the camera and the link on the sending side, and
//! the reassembly step on the receiving side.
//!
//! ## Architecture
//!
//! ```text
//! HOST (camera)                               WIFI (relay)
//! ┌──────────────────────────┐               ┌──────────────────────┐
//! │ CaptureSource            │               │ LinkReceiver         │
//! │   ↓  (rendezvous)        │               │   ↓                  │
//! │ CompressedPayload?       │   Host/Data   │ FrameAssembler       │
//! │   ↓                      │ ──────────►   │   ↓                  │
//! │ WireFrameHeader          │   Wifi/Data   │ ReceivedFrame        │
//! │   ↓                      │               │                      │
//! │ fragments → LinkSender   │               │                      │
//! └──────────────────────────┘               └──────────────────────┘
//!
//! Gate: LinkStateReader::client_attached(), written by the monitor.
//! ```
//!
//! ## Sub-modules
//!
//! | Module       | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | `types`      | The grayscale `Frame` buffer                         |
//! | `capture`    | Capture seam, one-shot rendezvous, synthetic source  |
//! | `encoder`    | Encoder seam and preallocated compressed payload     |
//! | `jpeg`       | Baseline grayscale JPEG split into three regions     |
//! | `fragment`   | Region → link-sized chunks                           |
//! | `pipeline`   | The gated capture-encode-send loop                   |
//! | `assembler`  | Receiver-side frame reassembly                       |
//! | `throughput` | Rolling bytes/second for diagnostics                 |

pub mod assembler;
pub mod capture;
pub mod encoder;
pub mod fragment;
pub mod jpeg;
pub mod pipeline;
pub mod throughput;
pub mod types;

pub use assembler::{FrameAssembler, ReceivedFrame};
pub use capture::{CaptureCompletion, CaptureRendezvous, CaptureSource, SyntheticCapture};
pub use encoder::{CompressedPayload, FrameEncoder, PayloadCapacity};
pub use fragment::{fragment_count, fragments, send_region};
pub use jpeg::{DEFAULT_JPEG_QUALITY, JpegFrameEncoder};
pub use pipeline::{CycleReport, FrameTransportPipeline, PipelineConfig, PipelineStats};
pub use throughput::ThroughputMeter;
pub use types::Frame;
