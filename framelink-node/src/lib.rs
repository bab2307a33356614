//! # framelink-node
//!
//! Runs one end of a framelink link.
//!
//! ## Roles
//!
//! - **stream**: the camera side. Connects to a relay, provisions
//!   credentials, watches status messages and streams frames once a
//!   client is attached.
//! - **relay**: stands in for the wifi chip. Accepts one streamer at a
//!   time, answers the connect command with association and client
//!   status, and reassembles incoming frames.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

pub mod config;
pub mod relay;
pub mod stream;

/// Resolves once `running` becomes false.
pub async fn wait_for_stop(running: &AtomicBool) {
    while running.load(Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}
