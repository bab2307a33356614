//! framelink node: entry point.
//!
//! ```text
//! framelink-node stream              Stream camera frames to a relay
//! framelink-node relay               Accept a streamer and reassemble frames
//! framelink-node --config <path> ..  Load a custom config TOML
//! framelink-node --gen-config        Write default config to stdout
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framelink_node::config::NodeConfig;
use framelink_node::relay::RelayNode;
use framelink_node::stream::StreamNode;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "framelink-node", about = "Camera frame streaming over a packet link")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "framelink.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,

    #[command(subcommand)]
    role: Option<Role>,
}

#[derive(Subcommand, Debug)]
enum Role {
    /// Capture, encode and stream frames (camera side).
    Stream {
        /// Relay address, overrides `link.relay_addr`.
        #[arg(long)]
        relay: Option<String>,
        /// Stop after this many frames.
        #[arg(long)]
        frames: Option<u64>,
        /// Send JPEG instead of raw frames.
        #[arg(long)]
        jpeg: bool,
    },
    /// Stand in for the wifi chip (receiver side).
    Relay {
        /// Listen address, overrides `link.listen_addr`.
        #[arg(long)]
        listen: Option<String>,
        /// Directory for received frames, overrides `relay.output_dir`.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&NodeConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let mut config = NodeConfig::load(&cli.config);
    let role = cli.role.unwrap_or(Role::Stream {
        relay: None,
        frames: None,
        jpeg: false,
    });
    apply_overrides(&mut config, &role);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("framelink-node v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "camera: {}x{}, mode {:?}",
        config.camera.width, config.camera.height, config.stream.mode
    );

    let result = match role {
        Role::Stream { .. } => {
            let node = StreamNode::new(config);
            stop_on_ctrl_c(node.stop_handle());
            node.run().await.map(|_| ())
        }
        Role::Relay { .. } => {
            let node = RelayNode::new(config);
            stop_on_ctrl_c(node.stop_handle());
            node.run().await
        }
    };

    if let Err(e) = &result {
        error!("fatal: {e}");
    }
    result
}

fn apply_overrides(config: &mut NodeConfig, role: &Role) {
    match role {
        Role::Stream {
            relay,
            frames,
            jpeg,
        } => {
            if let Some(addr) = relay {
                config.link.relay_addr = addr.clone();
            }
            if let Some(n) = frames {
                config.stream.frame_limit = *n;
            }
            if *jpeg {
                config.stream.mode = framelink_node::config::StreamMode::Jpeg;
            }
        }
        Role::Relay { listen, output } => {
            if let Some(addr) = listen {
                config.link.listen_addr = addr.clone();
            }
            if let Some(dir) = output {
                config.relay.output_dir = dir.display().to_string();
            }
        }
    }
}

/// Ctrl-C handler.
fn stop_on_ctrl_c(running: Arc<AtomicBool>) {
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        running.store(false, Ordering::SeqCst);
    });
}
