//! Relay node: a TCP stand-in for the wifi chip.
//!
//! Serves one streamer at a time. Control packets are decoded as
//! provisioning commands; `Connect` is answered with an association
//! status followed by a client-attach status, which opens the
//! streamer's gate. Data packets are reassembled into frames and
//! optionally written to disk.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use framelink_core::header::EncodingType;
use framelink_core::message::{ControlCommand, StatusMessage};
use framelink_core::network::LinkConnection;
use framelink_core::packet::LinkPacket;
use framelink_core::route::{Channel, Route};
use framelink_core::stream::{FrameAssembler, ReceivedFrame};

use crate::config::NodeConfig;
use crate::wait_for_stop;

// ── RelayNode ────────────────────────────────────────────────────

pub struct RelayNode {
    config: NodeConfig,
    running: Arc<AtomicBool>,
}

impl RelayNode {
    pub fn new(config: NodeConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.running)
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Bind the listen address and serve until stopped.
    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let listener = TcpListener::bind(&self.config.link.listen_addr).await?;
        info!("relay listening on {}", listener.local_addr()?);
        self.serve(listener).await
    }

    /// Accept streamers one at a time on `listener`.
    pub async fn serve(
        &self,
        listener: TcpListener,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let reported = self.config.reported_addr()?;
        let output_dir = self.config.output_dir();
        if let Some(dir) = &output_dir {
            tokio::fs::create_dir_all(dir).await?;
            info!("writing frames to {}", dir.display());
        }

        self.running.store(true, Ordering::SeqCst);
        while self.running.load(Ordering::SeqCst) {
            let accept = tokio::select! {
                result = listener.accept() => result,
                _ = wait_for_stop(&self.running) => break,
            };

            let (stream, peer) = match accept {
                Ok(pair) => pair,
                Err(e) => {
                    warn!("accept error: {e}");
                    continue;
                }
            };
            if let Err(e) = stream.set_nodelay(true) {
                warn!("nodelay failed for {peer}: {e}");
            }
            info!("streamer connected from {peer}");

            let session = RelaySession::new(reported, output_dir.clone());
            let summary = session.run(LinkConnection::new(stream), &self.running).await;
            info!(
                frames = summary.frames,
                dropped = summary.dropped,
                "session with {peer} ended"
            );
        }

        self.running.store(false, Ordering::SeqCst);
        info!("relay stopped");
        Ok(())
    }
}

// ── RelaySession ─────────────────────────────────────────────────

/// What one streamer session produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub ssid: Option<String>,
    pub password: Option<String>,
    pub frames: u64,
    pub dropped: u64,
}

/// State for a single connected streamer.
pub struct RelaySession {
    reported_addr: Ipv4Addr,
    output_dir: Option<PathBuf>,
    assembler: FrameAssembler,
    summary: SessionSummary,
}

impl RelaySession {
    pub fn new(reported_addr: Ipv4Addr, output_dir: Option<PathBuf>) -> Self {
        Self {
            reported_addr,
            output_dir,
            assembler: FrameAssembler::new(),
            summary: SessionSummary::default(),
        }
    }

    pub fn summary(&self) -> &SessionSummary {
        &self.summary
    }

    /// Apply one provisioning command. Returns the status replies to
    /// send back, in order.
    pub fn handle_control(&mut self, payload: &[u8]) -> Vec<StatusMessage> {
        let command = match ControlCommand::decode(payload) {
            Ok(cmd) => cmd,
            Err(e) => {
                warn!("malformed control packet: {e}");
                return Vec::new();
            }
        };
        debug!("control command {}", command.code());
        match command {
            ControlCommand::SetSsid(ssid) => {
                info!("ssid set to {ssid:?}");
                self.summary.ssid = Some(ssid);
                Vec::new()
            }
            ControlCommand::SetPassword(password) => {
                info!("password set ({} chars)", password.len());
                self.summary.password = Some(password);
                Vec::new()
            }
            ControlCommand::Connect => {
                if self.summary.ssid.is_none() {
                    warn!("connect requested before an ssid was set");
                }
                vec![
                    StatusMessage::LinkAssociated(self.reported_addr),
                    StatusMessage::ClientAttach(true),
                ]
            }
        }
    }

    /// Feed one data packet to the assembler.
    pub fn handle_data(&mut self, packet: &LinkPacket) -> Option<ReceivedFrame> {
        match self.assembler.push_packet(packet) {
            Ok(Some(frame)) => {
                self.summary.frames += 1;
                Some(frame)
            }
            Ok(None) => None,
            Err(e) => {
                self.summary.dropped += 1;
                warn!("dropping partial frame: {e}");
                None
            }
        }
    }

    /// Serve `conn` until the streamer disconnects or `running` clears.
    pub async fn run(mut self, mut conn: LinkConnection, running: &AtomicBool) -> SessionSummary {
        loop {
            let packet = tokio::select! {
                packet = conn.recv() => packet,
                _ = wait_for_stop(running) => break,
            };
            let Some(packet) = packet else { break };

            match packet.dst().channel {
                Channel::Control => {
                    for status in self.handle_control(packet.payload()) {
                        let reply = LinkPacket::new(
                            Route::WIFI_CONTROL,
                            Route::HOST_CONTROL,
                            status.encode(),
                        );
                        let sent = match reply {
                            Ok(reply) => conn.send(reply).await,
                            Err(e) => Err(e),
                        };
                        if let Err(e) = sent {
                            warn!("failed to send status: {e}");
                        }
                    }
                }
                Channel::Data => {
                    let Some(frame) = self.handle_data(&packet) else {
                        continue;
                    };
                    debug!(
                        width = frame.header.width,
                        height = frame.header.height,
                        bytes = frame.payload.len(),
                        "frame {} received",
                        self.summary.frames
                    );
                    if let Some(dir) = &self.output_dir {
                        match write_frame(dir, self.summary.frames, &frame).await {
                            Ok(path) => debug!("wrote {}", path.display()),
                            Err(e) => warn!("failed to write frame: {e}"),
                        }
                    }
                }
            }
        }
        self.summary.dropped += u64::from(self.assembler.in_progress());
        self.summary
    }
}

/// Write `frame` as `frame_NNNNN.pgm` (raw) or `frame_NNNNN.jpg`.
pub async fn write_frame(
    dir: &Path,
    index: u64,
    frame: &ReceivedFrame,
) -> std::io::Result<PathBuf> {
    let (ext, bytes) = match frame.encoding() {
        EncodingType::Raw => {
            let mut pgm =
                format!("P5\n{} {}\n255\n", frame.header.width, frame.header.height).into_bytes();
            pgm.extend_from_slice(&frame.payload);
            ("pgm", pgm)
        }
        EncodingType::Jpeg => ("jpg", frame.payload.to_vec()),
    };
    let path = dir.join(format!("frame_{index:05}.{ext}"));
    tokio::fs::write(&path, bytes).await?;
    Ok(path)
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use framelink_core::header::WireFrameHeader;

    fn header(total: u32) -> Vec<u8> {
        WireFrameHeader::new(2, 2, EncodingType::Raw, total)
            .to_bytes()
            .to_vec()
    }

    fn data(payload: Vec<u8>) -> LinkPacket {
        LinkPacket::new(Route::HOST_DATA, Route::WIFI_DATA, payload).unwrap()
    }

    fn session() -> RelaySession {
        RelaySession::new(Ipv4Addr::new(192, 168, 1, 42), None)
    }

    #[test]
    fn connect_replies_associated_then_attached() {
        let mut s = session();
        assert!(s.handle_control(&ControlCommand::SetSsid("lab".into()).encode().unwrap()).is_empty());
        assert!(
            s.handle_control(&ControlCommand::SetPassword("pw".into()).encode().unwrap())
                .is_empty()
        );
        let replies = s.handle_control(&ControlCommand::Connect.encode().unwrap());
        assert_eq!(
            replies,
            vec![
                StatusMessage::LinkAssociated(Ipv4Addr::new(192, 168, 1, 42)),
                StatusMessage::ClientAttach(true),
            ]
        );
        assert_eq!(s.summary().ssid.as_deref(), Some("lab"));
        assert_eq!(s.summary().password.as_deref(), Some("pw"));
    }

    #[test]
    fn malformed_control_is_ignored() {
        let mut s = session();
        assert!(s.handle_control(&[0x7E, 1, 2]).is_empty());
        assert!(s.handle_control(&[]).is_empty());
    }

    #[test]
    fn data_packets_reassemble() {
        let mut s = session();
        assert!(s.handle_data(&data(header(4))).is_none());
        let frame = s.handle_data(&data(vec![1, 2, 3, 4])).unwrap();
        assert_eq!(&frame.payload[..], &[1, 2, 3, 4]);
        assert_eq!(s.summary().frames, 1);
    }

    #[test]
    fn overrun_counts_as_dropped() {
        let mut s = session();
        s.handle_data(&data(header(2)));
        assert!(s.handle_data(&data(vec![0; 3])).is_none());
        assert_eq!(s.summary().dropped, 1);
        assert_eq!(s.summary().frames, 0);
    }

    #[tokio::test]
    async fn writes_pgm_for_raw_frames() {
        let dir = std::env::temp_dir().join(format!("framelink-relay-{}", std::process::id()));
        tokio::fs::create_dir_all(&dir).await.unwrap();

        let mut s = session();
        s.handle_data(&data(header(4)));
        let frame = s.handle_data(&data(vec![10, 20, 30, 40])).unwrap();
        let path = write_frame(&dir, 7, &frame).await.unwrap();
        assert!(path.ends_with("frame_00007.pgm"));

        let written = tokio::fs::read(&path).await.unwrap();
        assert!(written.starts_with(b"P5\n2 2\n255\n"));
        assert!(written.ends_with(&[10, 20, 30, 40]));
        let _ = tokio::fs::remove_dir_all(&dir).await;
    }

    #[tokio::test]
    async fn session_answers_over_link() {
        let (mut host, relay) = LinkConnection::memory_pair();
        let running = AtomicBool::new(true);
        let task = tokio::spawn(async move {
            let running = running;
            session().run(relay, &running).await
        });

        let connect = ControlCommand::Connect.encode().unwrap();
        host.send(LinkPacket::new(Route::HOST_CONTROL, Route::WIFI_CONTROL, connect).unwrap())
            .await
            .unwrap();

        let first = host.recv().await.unwrap();
        let second = host.recv().await.unwrap();
        assert_eq!(first.dst(), Route::HOST_CONTROL);
        assert_eq!(
            StatusMessage::parse(first.payload()),
            Some(StatusMessage::LinkAssociated(Ipv4Addr::new(192, 168, 1, 42)))
        );
        assert_eq!(
            StatusMessage::parse(second.payload()),
            Some(StatusMessage::ClientAttach(true))
        );

        drop(host);
        let summary = task.await.unwrap();
        assert_eq!(summary.frames, 0);
    }

    #[tokio::test]
    async fn serve_keeps_accepting_streamers() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let node = RelayNode::new(NodeConfig::default());
        let stop = node.stop_handle();
        let task = tokio::spawn(async move { node.serve(listener).await });

        // One streamer after another, each answered in full.
        for _ in 0..2 {
            let mut conn = LinkConnection::connect(&addr).await.unwrap();
            let connect = ControlCommand::Connect.encode().unwrap();
            conn.send(LinkPacket::new(Route::HOST_CONTROL, Route::WIFI_CONTROL, connect).unwrap())
                .await
                .unwrap();

            let timeout = std::time::Duration::from_secs(5);
            let first = tokio::time::timeout(timeout, conn.recv()).await.unwrap().unwrap();
            let second = tokio::time::timeout(timeout, conn.recv()).await.unwrap().unwrap();
            assert_eq!(
                StatusMessage::parse(first.payload()),
                Some(StatusMessage::LinkAssociated(Ipv4Addr::new(192, 168, 1, 42)))
            );
            assert_eq!(
                StatusMessage::parse(second.payload()),
                Some(StatusMessage::ClientAttach(true))
            );
        }

        stop.store(false, Ordering::SeqCst);
        assert!(task.await.unwrap().is_ok());
    }
}
