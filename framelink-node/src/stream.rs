//! Camera-side node.
//!
//! Wires the link to the status monitor, the provisioning sequencer and
//! the frame transport pipeline, then runs until stopped.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use framelink_core::control::{LinkStatusMonitor, ProvisioningSequencer};
use framelink_core::network::LinkConnection;
use framelink_core::state::{LinkStateReader, link_state};
use framelink_core::stream::{
    FrameTransportPipeline, JpegFrameEncoder, PipelineStats, SyntheticCapture,
};

use crate::config::{NodeConfig, StreamMode};
use crate::wait_for_stop;

// ── StreamNode ───────────────────────────────────────────────────

pub struct StreamNode {
    config: NodeConfig,
    running: Arc<AtomicBool>,
}

impl StreamNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Obtain a handle that stops the node from another task.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Connect to the relay and stream.
    pub async fn run(&self) -> Result<PipelineStats, Box<dyn std::error::Error + Send + Sync>> {
        let addr = &self.config.link.relay_addr;
        info!("connecting to relay at {addr}");
        let conn = LinkConnection::connect(addr).await?;
        self.run_on(conn).await
    }

    /// Stream over an already established link.
    ///
    /// 1. Starts the status monitor on the receive half.
    /// 2. Provisions credentials after the startup delay, and waits for
    ///    the commands to be queued before streaming.
    /// 3. Runs the pipeline until stopped, the frame limit is reached
    ///    or the link closes.
    pub async fn run_on(
        &self,
        conn: LinkConnection,
    ) -> Result<PipelineStats, Box<dyn std::error::Error + Send + Sync>> {
        // Invalid credentials or encoder setup end the node before
        // anything is sent.
        let sequencer = ProvisioningSequencer::new(self.config.credentials())?
            .with_startup_delay(self.config.startup_delay());

        let (tx, rx) = conn.split();
        let (writer, reader) = link_state();

        let pipeline_config = self.config.to_pipeline_config();
        let exposure = Duration::from_millis(self.config.camera.exposure_ms);
        let pipeline = FrameTransportPipeline::new(
            pipeline_config,
            SyntheticCapture::new(exposure),
            tx.clone(),
            reader.clone(),
        );
        let mut pipeline = match self.config.stream.mode {
            StreamMode::Raw => pipeline,
            StreamMode::Jpeg => pipeline.with_encoder(JpegFrameEncoder::new(
                self.config.camera.width,
                self.config.camera.height,
                self.config.stream.jpeg_quality,
            ))?,
        };

        self.running.store(true, Ordering::SeqCst);
        let monitor = LinkStatusMonitor::new(rx, writer).spawn();

        // Credentials go out before the first frame can, whatever the
        // monitor has already seen.
        let sent = sequencer.run(&tx).await;
        if sent < sequencer.commands().len() {
            warn!("only {sent} provisioning commands were sent");
        }

        let heartbeat = self
            .config
            .heartbeat()
            .map(|every| spawn_heartbeat(reader, every, Arc::clone(&self.running)));

        let pipeline_stop = pipeline.stop_handle();
        let mut handle = tokio::spawn(async move { pipeline.run().await });

        let result = tokio::select! {
            joined = &mut handle => joined,
            _ = wait_for_stop(&self.running) => {
                pipeline_stop.store(false, Ordering::SeqCst);
                handle.await
            }
        };

        self.running.store(false, Ordering::SeqCst);
        if let Some(h) = heartbeat {
            h.abort();
        }
        monitor.abort();

        let stats = match result {
            Ok(Ok(stats)) => stats,
            Ok(Err(e)) => {
                error!("pipeline stopped: {e}");
                return Err(e.into());
            }
            Err(e) => return Err(e.into()),
        };
        info!(
            frames = stats.frames_sent,
            skipped = stats.cycles_skipped,
            bytes = stats.bytes_sent,
            "stream node stopped"
        );
        Ok(stats)
    }
}

/// Periodic liveness line with the current link flags.
fn spawn_heartbeat(
    state: LinkStateReader,
    every: Duration,
    running: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        while running.load(Ordering::SeqCst) {
            ticker.tick().await;
            let snap = state.snapshot();
            info!(
                link_up = snap.link_up,
                client_attached = snap.client_attached,
                "alive"
            );
        }
    })
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_core::message::{ControlCommand, StatusMessage};
    use framelink_core::packet::LinkPacket;
    use framelink_core::route::Route;
    use framelink_core::stream::FrameAssembler;
    use std::net::Ipv4Addr;

    fn quick_config() -> NodeConfig {
        let mut cfg = NodeConfig::default();
        cfg.camera.width = 32;
        cfg.camera.height = 24;
        cfg.camera.exposure_ms = 0;
        cfg.wifi.startup_delay_ms = 0;
        cfg.stream.frame_pause_ms = 0;
        cfg.logging.heartbeat_secs = 0;
        cfg
    }

    #[test]
    fn node_creates_stopped() {
        let node = StreamNode::new(NodeConfig::default());
        assert!(!node.is_running());
        let handle = node.stop_handle();
        handle.store(true, Ordering::SeqCst);
        assert!(node.is_running());
        node.stop();
        assert!(!node.is_running());
    }

    #[tokio::test]
    async fn provisions_then_streams_after_attach() {
        let mut cfg = quick_config();
        cfg.stream.frame_limit = 2;
        let node = StreamNode::new(cfg);

        let (host, mut relay) = LinkConnection::memory_pair();
        let run = tokio::spawn(async move { node.run_on(host).await });

        for expected in [
            ControlCommand::SetSsid("framelink".into()),
            ControlCommand::SetPassword("changeme".into()),
            ControlCommand::Connect,
        ] {
            let pkt = relay.recv().await.unwrap();
            assert_eq!(ControlCommand::decode(pkt.payload()).unwrap(), expected);
        }

        for status in [
            StatusMessage::LinkAssociated(Ipv4Addr::new(10, 0, 0, 7)),
            StatusMessage::ClientAttach(true),
        ] {
            let pkt = LinkPacket::new(Route::WIFI_CONTROL, Route::HOST_CONTROL, status.encode())
                .unwrap();
            relay.send(pkt).await.unwrap();
        }

        let mut asm = FrameAssembler::new();
        let mut frames = 0;
        while frames < 2 {
            let pkt = relay.recv().await.unwrap();
            if let Some(frame) = asm.push_packet(&pkt).unwrap() {
                assert_eq!(frame.payload.len(), 32 * 24);
                frames += 1;
            }
        }

        let stats = run.await.unwrap().unwrap();
        assert_eq!(stats.frames_sent, 2);
    }

    #[tokio::test]
    async fn early_attach_does_not_overtake_provisioning() {
        let mut cfg = quick_config();
        cfg.wifi.startup_delay_ms = 100;
        cfg.stream.frame_limit = 1;
        let node = StreamNode::new(cfg);

        let (host, mut relay) = LinkConnection::memory_pair();
        // A stale attach from a previous session is already queued.
        let attach = LinkPacket::new(
            Route::WIFI_CONTROL,
            Route::HOST_CONTROL,
            StatusMessage::ClientAttach(true).encode(),
        )
        .unwrap();
        relay.send(attach).await.unwrap();

        let run = tokio::spawn(async move { node.run_on(host).await });

        for expected in [
            ControlCommand::SetSsid("framelink".into()),
            ControlCommand::SetPassword("changeme".into()),
            ControlCommand::Connect,
        ] {
            let pkt = relay.recv().await.unwrap();
            assert_eq!(pkt.dst(), Route::WIFI_CONTROL, "data sent before provisioning");
            assert_eq!(ControlCommand::decode(pkt.payload()).unwrap(), expected);
        }

        let header = relay.recv().await.unwrap();
        assert_eq!(header.dst(), Route::WIFI_DATA);
        assert_eq!(run.await.unwrap().unwrap().frames_sent, 1);
    }

    #[tokio::test]
    async fn bad_credentials_fail_before_sending() {
        let mut cfg = quick_config();
        cfg.wifi.ssid = "s".repeat(64);
        let node = StreamNode::new(cfg);
        let (host, mut relay) = LinkConnection::memory_pair();
        assert!(node.run_on(host).await.is_err());
        assert!(relay.recv().await.is_none());
    }
}
