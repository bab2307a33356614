//! Link throughput over the most recent frames, for the periodic
//! progress log. Nothing in the control flow reads it back.

use std::collections::VecDeque;
use std::time::Instant;

/// Frames kept for the rate estimate.
const HISTORY: usize = 32;

#[derive(Debug, Default)]
pub struct ThroughputMeter {
    /// `(sent_at, payload bytes)`, oldest first.
    sent: VecDeque<(Instant, u64)>,
}

impl ThroughputMeter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a frame of `bytes` that finished sending just now.
    pub fn record(&mut self, bytes: u64) {
        self.record_at(Instant::now(), bytes);
    }

    fn record_at(&mut self, at: Instant, bytes: u64) {
        if self.sent.len() == HISTORY {
            self.sent.pop_front();
        }
        self.sent.push_back((at, bytes));
    }

    /// Payload bytes per second between the oldest and newest frame.
    pub fn bytes_per_sec(&self) -> u64 {
        let Some(secs) = self.elapsed_secs() else {
            return 0;
        };
        // The oldest frame only marks where the interval starts.
        let bytes: u64 = self.sent.iter().skip(1).map(|&(_, b)| b).sum();
        (bytes as f64 / secs) as u64
    }

    pub fn frames_per_sec(&self) -> f64 {
        self.elapsed_secs()
            .map_or(0.0, |secs| (self.sent.len() - 1) as f64 / secs)
    }

    fn elapsed_secs(&self) -> Option<f64> {
        let (first, _) = self.sent.front()?;
        let (last, _) = self.sent.back()?;
        let secs = last.duration_since(*first).as_secs_f64();
        (secs > 0.0).then_some(secs)
    }
}
