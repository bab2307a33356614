//! Integration tests: provisioning, status gating and whole-frame
//! delivery, over in-memory links and over a byte stream through the
//! codec.

use std::net::Ipv4Addr;
use std::sync::atomic::Ordering;
use std::time::Duration;

use framelink_core::stream::PipelineStats;
use framelink_core::{
    ControlCommand, Credentials, EncodingType, FrameAssembler, FrameTransportPipeline,
    JpegFrameEncoder, LinkConnection, LinkPacket, LinkReceiver, LinkSender, LinkStatusMonitor,
    PayloadCapacity, PipelineConfig, ProvisioningSequencer, ReceivedFrame, Route, StatusMessage,
    StreamError, SyntheticCapture, link_state,
};
use tokio_test::{assert_err, assert_ok};

// ── Helpers ──────────────────────────────────────────────────────

fn test_config(width: u16, height: u16) -> PipelineConfig {
    PipelineConfig {
        width,
        height,
        gate_poll_interval: Duration::from_millis(1),
        frame_pause: Duration::ZERO,
        ..Default::default()
    }
}

async fn send_status(wifi: &LinkSender, status: StatusMessage) {
    let pkt = LinkPacket::new(Route::WIFI_CONTROL, Route::HOST_CONTROL, status.encode()).unwrap();
    wifi.send(pkt).await.unwrap();
}

/// Read data packets until one whole frame has been reassembled.
async fn next_frame(rx: &mut LinkReceiver, asm: &mut FrameAssembler) -> ReceivedFrame {
    let fut = async {
        loop {
            let pkt = rx.recv().await.expect("link closed");
            if let Some(frame) = asm.push_packet(&pkt).unwrap() {
                return frame;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), fut)
        .await
        .expect("timeout")
}

/// Host-side wiring: monitor on the receive half, pipeline on the send half.
fn host_side(
    host: LinkConnection,
    config: PipelineConfig,
) -> FrameTransportPipeline<SyntheticCapture> {
    let (tx, rx) = host.split();
    let (writer, reader) = link_state();
    LinkStatusMonitor::new(rx, writer).spawn();
    FrameTransportPipeline::new(config, SyntheticCapture::new(Duration::ZERO), tx, reader)
}

// ── Status gating ────────────────────────────────────────────────

#[tokio::test]
async fn test_pipeline_waits_for_client_attach() {
    let (host, wifi) = LinkConnection::memory_pair();
    let (wifi_tx, mut wifi_rx) = wifi.split();

    let pipeline = host_side(host, test_config(16, 16));
    let stop = pipeline.stop_handle();
    let handle = tokio::spawn(async move {
        let mut pipeline = pipeline;
        pipeline.run().await
    });

    // Associated but no client yet: still gated.
    send_status(&wifi_tx, StatusMessage::LinkAssociated(Ipv4Addr::new(192, 168, 1, 42))).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(wifi_rx.try_recv().is_none(), "frame sent before a client attached");

    send_status(&wifi_tx, StatusMessage::ClientAttach(true)).await;
    let mut asm = FrameAssembler::new();
    let frame = next_frame(&mut wifi_rx, &mut asm).await;
    assert_eq!(frame.payload.len(), 16 * 16);

    stop.store(false, Ordering::SeqCst);
    let stats: PipelineStats = assert_ok!(handle.await.unwrap());
    assert!(stats.frames_sent >= 1);
    assert_eq!(stats.cycles_skipped, 0);
}

#[tokio::test]
async fn test_client_detach_pauses_stream() {
    let (host, wifi) = LinkConnection::memory_pair();
    let (wifi_tx, mut wifi_rx) = wifi.split();

    let mut cfg = test_config(8, 8);
    cfg.frame_pause = Duration::from_millis(1);
    let pipeline = host_side(host, cfg);
    let stop = pipeline.stop_handle();
    let handle = tokio::spawn(async move {
        let mut pipeline = pipeline;
        pipeline.run().await
    });

    send_status(&wifi_tx, StatusMessage::ClientAttach(true)).await;
    let mut asm = FrameAssembler::new();
    next_frame(&mut wifi_rx, &mut asm).await;

    send_status(&wifi_tx, StatusMessage::ClientAttach(false)).await;
    // Let any frame already in flight drain.
    tokio::time::sleep(Duration::from_millis(50)).await;
    while wifi_rx.try_recv().is_some() {}
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(wifi_rx.try_recv().is_none(), "frame sent after detach");

    stop.store(false, Ordering::SeqCst);
    assert_ok!(handle.await.unwrap());
}

// ── Whole frames ─────────────────────────────────────────────────

#[tokio::test]
async fn test_full_resolution_raw_frame() {
    let (host, wifi) = LinkConnection::memory_pair();
    let (wifi_tx, mut wifi_rx) = wifi.split();

    let mut cfg = test_config(324, 244);
    cfg.frame_limit = Some(1);
    let mut pipeline = host_side(host, cfg);
    assert_eq!(pipeline.encoding(), EncodingType::Raw);
    let handle = tokio::spawn(async move { pipeline.run().await });

    send_status(&wifi_tx, StatusMessage::LinkAssociated(Ipv4Addr::new(192, 168, 1, 42))).await;
    send_status(&wifi_tx, StatusMessage::ClientAttach(true)).await;

    let mut asm = FrameAssembler::new();
    let frame = next_frame(&mut wifi_rx, &mut asm).await;
    assert_eq!(frame.header.width, 324);
    assert_eq!(frame.header.height, 244);
    assert_eq!(frame.header.encoding, EncodingType::Raw);
    assert_eq!(frame.header.total_len, 79_056);
    assert_eq!(frame.payload.len(), 79_056);

    // Synthetic pattern: pixel = x + y + frame number.
    let first = frame.payload[0];
    assert_eq!(frame.payload[1], first.wrapping_add(1));
    assert_eq!(frame.payload[324], first.wrapping_add(1));

    let stats = assert_ok!(handle.await.unwrap());
    assert_eq!(stats.frames_sent, 1);
    // header + ceil(79_056 / 28)
    assert_eq!(stats.packets_sent, 1 + 2824);
}

#[tokio::test]
async fn test_jpeg_frames_over_byte_stream() {
    let (left, right) = tokio::io::duplex(4096);
    let host = LinkConnection::new(left);
    let wifi = LinkConnection::new(right);
    let (wifi_tx, mut wifi_rx) = wifi.split();

    let mut cfg = test_config(64, 48);
    cfg.frame_limit = Some(2);
    let mut pipeline = assert_ok!(host_side(host, cfg).with_encoder(JpegFrameEncoder::new(64, 48, 75)));
    assert_eq!(pipeline.encoding(), EncodingType::Jpeg);
    let handle = tokio::spawn(async move { pipeline.run().await });

    send_status(&wifi_tx, StatusMessage::ClientAttach(true)).await;

    let mut asm = FrameAssembler::new();
    for _ in 0..2 {
        let frame = next_frame(&mut wifi_rx, &mut asm).await;
        assert_eq!(frame.encoding(), EncodingType::Jpeg);
        assert_eq!(frame.payload.len(), frame.header.total_len as usize);
        assert_eq!(&frame.payload[..2], &[0xFF, 0xD8]);

        let img = image::load_from_memory_with_format(&frame.payload, image::ImageFormat::Jpeg)
            .expect("valid jpeg");
        assert_eq!((img.width(), img.height()), (64, 48));
    }

    let stats = assert_ok!(handle.await.unwrap());
    assert_eq!(stats.frames_sent, 2);
}

#[tokio::test]
async fn test_oversized_body_skips_cycles() {
    let (host, wifi) = LinkConnection::memory_pair();
    let (wifi_tx, mut wifi_rx) = wifi.split();

    let mut cfg = test_config(64, 48);
    cfg.capacity = PayloadCapacity {
        body: 8,
        ..Default::default()
    };
    let pipeline = assert_ok!(host_side(host, cfg).with_encoder(JpegFrameEncoder::new(64, 48, 75)));
    let stop = pipeline.stop_handle();
    let handle = tokio::spawn(async move {
        let mut pipeline = pipeline;
        pipeline.run().await
    });

    send_status(&wifi_tx, StatusMessage::ClientAttach(true)).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    stop.store(false, Ordering::SeqCst);

    let stats = assert_ok!(handle.await.unwrap());
    assert_eq!(stats.frames_sent, 0);
    assert!(stats.cycles_skipped > 0);
    assert!(wifi_rx.try_recv().is_none(), "skipped cycle leaked a packet");
}

#[tokio::test]
async fn test_encoder_header_too_large_is_fatal() {
    let (host, _wifi) = LinkConnection::memory_pair();
    let mut cfg = test_config(64, 48);
    cfg.capacity = PayloadCapacity {
        header: 16,
        ..Default::default()
    };
    let result = host_side(host, cfg).with_encoder(JpegFrameEncoder::new(64, 48, 75));
    let err = assert_err!(result.map(|_| ()));
    assert!(matches!(err, StreamError::CapacityExceeded { region: "header", .. }));
}

// ── Provisioning ─────────────────────────────────────────────────

#[tokio::test]
async fn test_provisioning_order_over_byte_stream() {
    let (left, right) = tokio::io::duplex(256);
    let host = LinkConnection::new(left);
    let mut wifi = LinkConnection::new(right);

    let sequencer = assert_ok!(ProvisioningSequencer::new(Credentials {
        ssid: "lab-net".into(),
        password: "hunter22".into(),
    }));
    assert_eq!(sequencer.run(&host.sender()).await, 3);

    let mut got = Vec::new();
    for _ in 0..3 {
        let pkt = tokio::time::timeout(Duration::from_secs(5), wifi.recv())
            .await
            .expect("timeout")
            .expect("link closed");
        assert_eq!(pkt.src(), Route::HOST_CONTROL);
        assert_eq!(pkt.dst(), Route::WIFI_CONTROL);
        got.push(assert_ok!(ControlCommand::decode(pkt.payload())));
    }
    assert_eq!(
        got,
        vec![
            ControlCommand::SetSsid("lab-net".into()),
            ControlCommand::SetPassword("hunter22".into()),
            ControlCommand::Connect,
        ]
    );
}

#[tokio::test]
async fn test_overlong_credentials_rejected_up_front() {
    let result = ProvisioningSequencer::new(Credentials {
        ssid: "x".repeat(40),
        password: "pw".into(),
    });
    assert!(matches!(result, Err(StreamError::InvalidCredential(_))));
}

#[tokio::test]
async fn test_monitor_survives_unknown_status() {
    let (host, wifi) = LinkConnection::memory_pair();
    let (host_tx, host_rx) = host.split();
    let (wifi_tx, _wifi_rx) = wifi.split();
    let (writer, reader) = link_state();
    let monitor = LinkStatusMonitor::new(host_rx, writer).spawn();

    let junk = LinkPacket::new(Route::WIFI_CONTROL, Route::HOST_CONTROL, vec![0x7F, 0x01]).unwrap();
    wifi_tx.send(junk).await.unwrap();
    send_status(&wifi_tx, StatusMessage::ClientAttach(true)).await;

    drop(wifi_tx);
    drop(host_tx);
    let stats = monitor.await.unwrap();
    assert_eq!(stats.received, 2);
    assert_eq!(stats.ignored, 1);
    assert!(reader.client_attached());
    assert!(!reader.link_up());
}
