//! One-shot credential handoff and connect request.

use std::time::Duration;

use tracing::{info, warn};

use crate::error::StreamError;
use crate::message::ControlCommand;
use crate::network::LinkSender;
use crate::packet::LinkPacket;
use crate::route::Route;

/// Network credentials handed to the wifi chip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub ssid: String,
    pub password: String,
}

/// Sends `SetSsid`, `SetPassword`, `Connect` in that order.
///
/// Nothing is awaited between commands; whether the chip actually
/// joined the network is reported later through the status monitor.
#[derive(Debug, Clone)]
pub struct ProvisioningSequencer {
    commands: [ControlCommand; 3],
    startup_delay: Duration,
}

impl ProvisioningSequencer {
    /// Fails if either credential cannot be carried in one packet.
    pub fn new(credentials: Credentials) -> Result<Self, StreamError> {
        let commands = [
            ControlCommand::SetSsid(credentials.ssid),
            ControlCommand::SetPassword(credentials.password),
            ControlCommand::Connect,
        ];
        for cmd in &commands {
            cmd.validate()?;
        }
        Ok(Self {
            commands,
            startup_delay: Duration::ZERO,
        })
    }

    /// Wait this long before the first command, giving the peer time to boot.
    pub fn with_startup_delay(mut self, delay: Duration) -> Self {
        self.startup_delay = delay;
        self
    }

    pub fn commands(&self) -> &[ControlCommand] {
        &self.commands
    }

    /// Issue the sequence. Returns the number of commands the link accepted.
    pub async fn run(&self, link: &LinkSender) -> usize {
        if !self.startup_delay.is_zero() {
            tokio::time::sleep(self.startup_delay).await;
        }

        info!("sending wifi credentials");
        let mut sent = 0;
        for cmd in &self.commands {
            let result = async {
                let packet = LinkPacket::new(Route::HOST_CONTROL, Route::WIFI_CONTROL, cmd.encode()?)?;
                link.send(packet).await
            }
            .await;
            match result {
                Ok(()) => sent += 1,
                Err(e) => warn!("failed to send {}: {e}", cmd.code()),
            }
        }
        sent
    }
}
