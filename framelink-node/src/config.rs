//! Configuration for both node roles.

use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use framelink_core::control::Credentials;
use framelink_core::stream::{PayloadCapacity, PipelineConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Link endpoints.
    pub link: LinkConfig,
    /// Camera geometry and timing.
    pub camera: CameraConfig,
    /// Pipeline tuning.
    pub stream: StreamConfig,
    /// Credentials and provisioning.
    pub wifi: WifiConfig,
    /// Relay-only settings.
    pub relay: RelayConfig,
    /// Logging settings.
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    /// Where the streamer connects to reach the relay.
    pub relay_addr: String,
    /// Where the relay listens.
    pub listen_addr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub width: u16,
    pub height: u16,
    /// Simulated exposure time of the synthetic source.
    pub exposure_ms: u64,
}

/// Payload encoding on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
    Raw,
    Jpeg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamConfig {
    pub mode: StreamMode,
    /// 1..=100.
    pub jpeg_quality: u8,
    pub header_capacity: usize,
    pub footer_capacity: usize,
    pub body_capacity: usize,
    pub gate_poll_ms: u64,
    pub frame_pause_ms: u64,
    /// 0 waits forever.
    pub capture_timeout_ms: u64,
    /// 0 streams until stopped.
    pub frame_limit: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WifiConfig {
    pub ssid: String,
    pub password: String,
    /// Delay before provisioning, to let the wifi chip boot.
    pub startup_delay_ms: u64,
    /// Address the relay reports once "associated".
    pub reported_addr: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Directory to write received frames into. Empty disables writing.
    pub output_dir: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Seconds between liveness log lines. 0 disables them.
    pub heartbeat_secs: u64,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            relay_addr: "127.0.0.1:7440".into(),
            listen_addr: "0.0.0.0:7440".into(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            width: 324,
            height: 244,
            exposure_ms: 30,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        let capacity = PayloadCapacity::default();
        Self {
            mode: StreamMode::Raw,
            jpeg_quality: framelink_core::stream::DEFAULT_JPEG_QUALITY,
            header_capacity: capacity.header,
            footer_capacity: capacity.footer,
            body_capacity: capacity.body,
            gate_poll_ms: 10,
            frame_pause_ms: 10,
            capture_timeout_ms: 0,
            frame_limit: 0,
        }
    }
}

impl Default for WifiConfig {
    fn default() -> Self {
        Self {
            ssid: "framelink".into(),
            password: "changeme".into(),
            startup_delay_ms: 2000,
            reported_addr: "192.168.1.42".into(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            heartbeat_secs: 10,
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl NodeConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Pipeline settings derived from the camera and stream sections.
    pub fn to_pipeline_config(&self) -> PipelineConfig {
        let ms = Duration::from_millis;
        PipelineConfig {
            width: self.camera.width.max(1),
            height: self.camera.height.max(1),
            gate_poll_interval: ms(self.stream.gate_poll_ms.max(1)),
            frame_pause: ms(self.stream.frame_pause_ms),
            capture_timeout: (self.stream.capture_timeout_ms > 0)
                .then(|| ms(self.stream.capture_timeout_ms)),
            capacity: PayloadCapacity {
                header: self.stream.header_capacity,
                footer: self.stream.footer_capacity,
                body: self.stream.body_capacity,
            },
            frame_limit: (self.stream.frame_limit > 0).then_some(self.stream.frame_limit),
        }
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            ssid: self.wifi.ssid.clone(),
            password: self.wifi.password.clone(),
        }
    }

    pub fn startup_delay(&self) -> Duration {
        Duration::from_millis(self.wifi.startup_delay_ms)
    }

    /// The address the relay announces in its association status.
    pub fn reported_addr(&self) -> Result<Ipv4Addr, std::net::AddrParseError> {
        self.wifi.reported_addr.parse()
    }

    pub fn output_dir(&self) -> Option<PathBuf> {
        (!self.relay.output_dir.is_empty()).then(|| PathBuf::from(&self.relay.output_dir))
    }

    pub fn heartbeat(&self) -> Option<Duration> {
        (self.logging.heartbeat_secs > 0).then(|| Duration::from_secs(self.logging.heartbeat_secs))
    }
}

// ── Tests ────────────────────────────────────────────────────────
