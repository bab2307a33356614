//! The producer loop: gate, capture, encode, frame, fragment, send.
//!
//! ```text
//!  Idle ──► Capturing ──► Encoding? ──► Framing ──► Sending ──┐
//!   ▲  │                                                      │
//!   │  └─ client not attached: sleep, retry                   │
//!   └─────────────────────────────────────────────────────────┘
//! ```
//!
//! There is a single frame buffer. It is lent to the capture source
//! and comes back through the rendezvous, so the next capture cannot
//! start before every fragment of the current frame has been queued.
//! A capture or encode failure skips the frame entirely; the receiver
//! never sees a header without its payload.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::StreamError;
use crate::header::{EncodingType, WireFrameHeader};
use crate::network::LinkSender;
use crate::packet::{LinkPacket, PACKET_DATA_CAPACITY};
use crate::route::Route;
use crate::state::LinkStateReader;
use crate::stream::capture::{CaptureRendezvous, CaptureSource};
use crate::stream::encoder::{CompressedPayload, FrameEncoder, PayloadCapacity};
use crate::stream::fragment::send_region;
use crate::stream::throughput::ThroughputMeter;
use crate::stream::types::Frame;

// ── PipelineConfig ───────────────────────────────────────────────

/// Configuration for [`FrameTransportPipeline`].
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Frame width in pixels.
    pub width: u16,
    /// Frame height in pixels.
    pub height: u16,
    /// Sleep between gate checks while no client is attached.
    pub gate_poll_interval: Duration,
    /// Pause after each transmitted frame.
    pub frame_pause: Duration,
    /// Give up on a capture after this long. `None` waits forever.
    pub capture_timeout: Option<Duration>,
    /// Preallocated sizes for compressed payload regions.
    pub capacity: PayloadCapacity,
    /// Stop after this many frames have been sent.
    pub frame_limit: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            width: 324,
            height: 244,
            gate_poll_interval: Duration::from_millis(10),
            frame_pause: Duration::from_millis(10),
            capture_timeout: None,
            capacity: PayloadCapacity::default(),
            frame_limit: None,
        }
    }
}

// ── Reports ──────────────────────────────────────────────────────

/// What one successful cycle did.
#[derive(Debug, Clone, Copy)]
pub struct CycleReport {
    pub encoding: EncodingType,
    /// Payload bytes announced in the frame header.
    pub total_len: u32,
    /// Packets sent, including the header packet.
    pub packets: usize,
    pub capture_time: Duration,
    pub encode_time: Duration,
    pub send_time: Duration,
}

/// Running totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    pub frames_sent: u64,
    pub cycles_skipped: u64,
    pub bytes_sent: u64,
    pub packets_sent: u64,
}

// ── FrameTransportPipeline ───────────────────────────────────────

type BoxedPayload = CompressedPayload<Box<dyn FrameEncoder>>;

pub struct FrameTransportPipeline<C> {
    config: PipelineConfig,
    capture: C,
    compressed: Option<BoxedPayload>,
    link: LinkSender,
    state: LinkStateReader,
    /// `None` only while lent to the capture source, or after a failed
    /// capture kept it.
    frame: Option<Frame>,
    rendezvous: CaptureRendezvous,
    stats: PipelineStats,
    meter: ThroughputMeter,
    running: Arc<AtomicBool>,
}

impl<C: CaptureSource> FrameTransportPipeline<C> {
    /// A pipeline that sends raw frames.
    pub fn new(
        config: PipelineConfig,
        capture: C,
        link: LinkSender,
        state: LinkStateReader,
    ) -> Self {
        let frame = Frame::new(config.width, config.height);
        info!("allocated memory for image: {} bytes", frame.byte_len());
        Self {
            config,
            capture,
            compressed: None,
            link,
            state,
            frame: Some(frame),
            rendezvous: CaptureRendezvous::new(),
            stats: PipelineStats::default(),
            meter: ThroughputMeter::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Switch to compressed mode.
    ///
    /// Opens the encoder, producing its header and footer. Failure is
    /// an initialization error and the pipeline must not run.
    pub fn with_encoder<E: FrameEncoder + 'static>(mut self, encoder: E) -> Result<Self, StreamError> {
        let boxed: Box<dyn FrameEncoder> = Box::new(encoder);
        self.compressed = Some(CompressedPayload::open(boxed, self.config.capacity)?);
        Ok(self)
    }

    /// The encoding announced in every frame header.
    pub fn encoding(&self) -> EncodingType {
        match self.compressed {
            Some(_) => EncodingType::Jpeg,
            None => EncodingType::Raw,
        }
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// A cloneable handle that stops the loop from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Run until stopped, the frame limit is reached, or the link closes.
    ///
    /// Per-cycle capture and encode failures are logged and the frame
    /// is skipped. A closed link ends the loop with an error.
    pub async fn run(&mut self) -> Result<PipelineStats, StreamError> {
        self.running.store(true, Ordering::SeqCst);
        info!("starting camera loop ({:?})", self.encoding());

        while self.running.load(Ordering::SeqCst) {
            if self.limit_reached() {
                break;
            }

            if !self.state.client_attached() {
                tokio::time::sleep(self.config.gate_poll_interval).await;
                continue;
            }

            match self.run_cycle().await {
                Ok(report) => {
                    debug!(
                        "captured in {} ms, encoded in {} ms, sent {} bytes in {} packets in {} ms",
                        report.capture_time.as_millis(),
                        report.encode_time.as_millis(),
                        report.total_len,
                        report.packets,
                        report.send_time.as_millis(),
                    );
                    if self.stats.frames_sent % 100 == 0 {
                        info!(
                            frames = self.stats.frames_sent,
                            skipped = self.stats.cycles_skipped,
                            "streaming at {} B/s, {:.1} fps",
                            self.meter.bytes_per_sec(),
                            self.meter.frames_per_sec(),
                        );
                    }
                    if !self.config.frame_pause.is_zero() {
                        tokio::time::sleep(self.config.frame_pause).await;
                    }
                }
                Err(e) if e.is_cycle_error() => {
                    self.stats.cycles_skipped += 1;
                    warn!("skipping frame: {e}");
                }
                Err(e) => {
                    self.running.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!(
            frames = self.stats.frames_sent,
            skipped = self.stats.cycles_skipped,
            "camera loop stopped"
        );
        Ok(self.stats)
    }

    /// One capture-encode-send cycle, ignoring the gate.
    pub async fn run_cycle(&mut self) -> Result<CycleReport, StreamError> {
        let started = Instant::now();
        self.capture_frame().await?;
        let capture_time = started.elapsed();

        let frame = self
            .frame
            .as_ref()
            .ok_or(StreamError::ProtocolViolation("frame buffer missing after capture"))?;

        let encode_started = Instant::now();
        let (encoding, regions): (EncodingType, [&[u8]; 3]) = match self.compressed.as_mut() {
            Some(payload) => {
                payload.encode(frame)?;
                (EncodingType::Jpeg, payload.regions())
            }
            None => (EncodingType::Raw, [frame.data(), &[][..], &[][..]]),
        };
        let encode_time = encode_started.elapsed();

        let total: usize = regions.iter().map(|r| r.len()).sum();
        let total_len = u32::try_from(total).map_err(|_| StreamError::CapacityExceeded {
            region: "payload",
            size: total,
            capacity: u32::MAX as usize,
        })?;

        let send_started = Instant::now();
        let header = WireFrameHeader::new(frame.width(), frame.height(), encoding, total_len);
        let mut packets = send_frame(&self.link, &header, &regions).await?;
        packets += 1;
        let send_time = send_started.elapsed();

        self.stats.frames_sent += 1;
        self.stats.bytes_sent += total as u64;
        self.stats.packets_sent += packets as u64;
        self.meter.record(total as u64);

        Ok(CycleReport {
            encoding,
            total_len,
            packets,
            capture_time,
            encode_time,
            send_time,
        })
    }

    // ── Internal ─────────────────────────────────────────────────

    fn limit_reached(&self) -> bool {
        self.config
            .frame_limit
            .is_some_and(|limit| self.stats.frames_sent >= limit)
    }

    /// Lend the buffer to the source and wait for it to come back.
    async fn capture_frame(&mut self) -> Result<(), StreamError> {
        let done = self.rendezvous.arm()?;
        let frame = match self.frame.take() {
            Some(frame) => frame,
            None => {
                debug!("reallocating frame buffer after failed capture");
                Frame::new(self.config.width, self.config.height)
            }
        };
        self.capture.begin_capture(frame, done);

        let frame = self.rendezvous.wait(self.config.capture_timeout).await?;
        if frame.width() != self.config.width || frame.height() != self.config.height {
            return Err(StreamError::CaptureFailed(format!(
                "source returned a {}x{} frame, expected {}x{}",
                frame.width(),
                frame.height(),
                self.config.width,
                self.config.height
            )));
        }
        self.frame = Some(frame);
        Ok(())
    }
}

/// Send the header packet followed by every region, each fragmented on
/// its own. Returns the number of payload packets.
async fn send_frame(
    link: &LinkSender,
    header: &WireFrameHeader,
    regions: &[&[u8]],
) -> Result<usize, StreamError> {
    link.send(LinkPacket::from_slice(
        Route::HOST_DATA,
        Route::WIFI_DATA,
        &header.to_bytes(),
    )?)
    .await?;

    let mut packets = 0;
    for region in regions {
        packets += send_region(
            link,
            Route::HOST_DATA,
            Route::WIFI_DATA,
            region,
            PACKET_DATA_CAPACITY,
        )
        .await?;
    }
    Ok(packets)
}
