//! Asynchronous frame capture.
//!
//! A [`CaptureSource`] is handed the pipeline's frame buffer together
//! with a [`CaptureCompletion`]. It fills the buffer on whatever
//! context it likes and hands it back by completing exactly once. The
//! pipeline side waits on a [`CaptureRendezvous`], which holds at most
//! one outstanding capture.
//!
//! ```text
//!   pipeline                         source
//!   ────────                         ──────
//!   arm() ──► CaptureCompletion ──►  begin_capture(frame, done)
//!   wait() ◄──────── oneshot ◄─────  done.complete(frame)
//! ```

use std::time::Duration;

use tokio::sync::oneshot;
use tracing::trace;

use crate::error::StreamError;
use crate::stream::types::Frame;

type Completion = Result<Frame, String>;

// ── CaptureSource ────────────────────────────────────────────────

/// A camera, or anything that can fill a grayscale frame buffer.
pub trait CaptureSource: Send {
    /// Start filling `frame`. The source owns the buffer until it
    /// calls [`CaptureCompletion::complete`] or
    /// [`CaptureCompletion::fail`]; dropping `done` without calling
    /// either is reported to the pipeline as an abandoned capture.
    fn begin_capture(&mut self, frame: Frame, done: CaptureCompletion);
}

// ── CaptureCompletion ────────────────────────────────────────────

/// One-shot completion handle passed to the capture source.
#[derive(Debug)]
pub struct CaptureCompletion {
    tx: oneshot::Sender<Completion>,
}

impl CaptureCompletion {
    /// Hand the filled buffer back to the waiting pipeline.
    pub fn complete(self, frame: Frame) {
        // The pipeline may have given up on this capture already.
        let _ = self.tx.send(Ok(frame));
    }

    /// Report a failed capture. The buffer is dropped.
    pub fn fail(self, reason: impl Into<String>) {
        let _ = self.tx.send(Err(reason.into()));
    }
}

// ── CaptureRendezvous ────────────────────────────────────────────

/// Single-slot meeting point between the pipeline and the source.
#[derive(Debug, Default)]
pub struct CaptureRendezvous {
    pending: Option<oneshot::Receiver<Completion>>,
}

impl CaptureRendezvous {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a capture is outstanding.
    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }

    /// Create the completion handle for the next capture.
    ///
    /// Fails with [`StreamError::CaptureInFlight`] while a previous
    /// capture has not been waited for.
    pub fn arm(&mut self) -> Result<CaptureCompletion, StreamError> {
        if self.pending.is_some() {
            return Err(StreamError::CaptureInFlight);
        }
        let (tx, rx) = oneshot::channel();
        self.pending = Some(rx);
        Ok(CaptureCompletion { tx })
    }

    /// Wait for the armed capture to complete.
    ///
    /// With `timeout` set, an overdue capture is abandoned: a late
    /// completion is discarded and the rendezvous can be armed again.
    pub async fn wait(&mut self, timeout: Option<Duration>) -> Result<Frame, StreamError> {
        let rx = self
            .pending
            .take()
            .ok_or(StreamError::ProtocolViolation("no capture armed"))?;

        let completion = match timeout {
            Some(limit) => tokio::time::timeout(limit, rx)
                .await
                .map_err(|_| StreamError::CaptureTimeout(limit))?,
            None => rx.await,
        };

        match completion {
            Ok(Ok(frame)) => Ok(frame),
            Ok(Err(reason)) => Err(StreamError::CaptureFailed(reason)),
            Err(_) => Err(StreamError::CaptureAbandoned),
        }
    }
}

// ── SyntheticCapture ─────────────────────────────────────────────

/// Test-pattern source: a diagonal gradient that scrolls one pixel per
/// frame, delivered from a spawned task after `exposure`.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct SyntheticCapture {
    exposure: Duration,
    frame_number: u64,
}

impl SyntheticCapture {
    pub fn new(exposure: Duration) -> Self {
        Self {
            exposure,
            frame_number: 0,
        }
    }

    /// Number of captures started so far.
    pub fn frame_number(&self) -> u64 {
        self.frame_number
    }

    /// Fill `frame` with the pattern for `frame_number`.
    pub fn paint(frame: &mut Frame, frame_number: u64) {
        let width = frame.width() as usize;
        let shift = frame_number as usize;
        for (i, px) in frame.data_mut().iter_mut().enumerate() {
            let (x, y) = (i % width, i / width);
            *px = (x + y + shift) as u8;
        }
    }
}

impl CaptureSource for SyntheticCapture {
    fn begin_capture(&mut self, mut frame: Frame, done: CaptureCompletion) {
        let frame_number = self.frame_number;
        self.frame_number += 1;
        let exposure = self.exposure;
        trace!(frame_number, "synthetic capture started");

        tokio::spawn(async move {
            if !exposure.is_zero() {
                tokio::time::sleep(exposure).await;
            }
            Self::paint(&mut frame, frame_number);
            done.complete(frame);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn completes_through_rendezvous() {
        let mut rv = CaptureRendezvous::new();
        let done = rv.arm().unwrap();
        assert!(rv.is_armed());

        let mut source = SyntheticCapture::new(Duration::from_millis(1));
        source.begin_capture(Frame::new(8, 2), done);

        let frame = rv.wait(None).await.unwrap();
        assert_eq!(frame.byte_len(), 16);
        // first pixel of the second row
        assert_eq!(frame.data()[8], 1);
        assert!(!rv.is_armed());
    }

    #[test]
    fn rearm_before_wait_is_rejected() {
        let mut rv = CaptureRendezvous::new();
        let _done = rv.arm().unwrap();
        assert!(matches!(rv.arm(), Err(StreamError::CaptureInFlight)));
    }

    #[tokio::test]
    async fn dropped_completion_is_abandoned() {
        let mut rv = CaptureRendezvous::new();
        drop(rv.arm().unwrap());
        assert!(matches!(rv.wait(None).await, Err(StreamError::CaptureAbandoned)));
    }

    #[tokio::test]
    async fn failure_reason_is_reported() {
        let mut rv = CaptureRendezvous::new();
        rv.arm().unwrap().fail("sensor timeout");
        match rv.wait(None).await {
            Err(StreamError::CaptureFailed(reason)) => assert_eq!(reason, "sensor timeout"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn overdue_capture_times_out_and_rearms() {
        let mut rv = CaptureRendezvous::new();
        let late = rv.arm().unwrap();
        let err = rv.wait(Some(Duration::from_millis(10))).await.unwrap_err();
        assert!(matches!(err, StreamError::CaptureTimeout(_)));

        // The stale handle completing later must not disturb the next capture.
        late.complete(Frame::new(1, 1));
        let done = rv.arm().unwrap();
        done.complete(Frame::new(2, 2));
        assert_eq!(rv.wait(None).await.unwrap().byte_len(), 4);
    }

    #[tokio::test]
    async fn wait_without_arm_is_an_error() {
        let mut rv = CaptureRendezvous::new();
        assert!(rv.wait(None).await.is_err());
    }

    #[test]
    fn pattern_scrolls() {
        let mut a = Frame::new(4, 4);
        let mut b = Frame::new(4, 4);
        SyntheticCapture::paint(&mut a, 0);
        SyntheticCapture::paint(&mut b, 1);
        assert_eq!(a.data()[0], 0);
        assert_eq!(b.data()[0], 1);
        assert_eq!(a.data()[5], 2);
    }
}
