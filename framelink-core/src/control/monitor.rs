//! Status monitor: drains the link and keeps the connection flags current.

use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::message::StatusMessage;
use crate::network::LinkReceiver;
use crate::packet::LinkPacket;
use crate::route::Channel;
use crate::state::LinkStateWriter;

/// Counters kept by [`LinkStatusMonitor`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorStats {
    /// Packets taken off the link.
    pub received: u64,
    /// Status messages that changed or confirmed a flag.
    pub applied: u64,
    /// Short, unknown, or misrouted packets.
    pub ignored: u64,
}

/// Owns the only [`LinkStateWriter`] and the receiving side of the link.
pub struct LinkStatusMonitor {
    receiver: LinkReceiver,
    state: LinkStateWriter,
    stats: MonitorStats,
}

impl LinkStatusMonitor {
    pub fn new(receiver: LinkReceiver, state: LinkStateWriter) -> Self {
        Self {
            receiver,
            state,
            stats: MonitorStats::default(),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        self.stats
    }

    /// Apply one packet to the connection flags.
    ///
    /// Returns the status that was applied, or `None` if the packet
    /// was ignored. Never fails.
    pub fn handle_packet(&mut self, packet: &LinkPacket) -> Option<StatusMessage> {
        self.stats.received += 1;

        if packet.dst().channel != Channel::Control {
            trace!("ignoring packet for {}", packet.dst());
            self.stats.ignored += 1;
            return None;
        }

        let status = StatusMessage::parse(packet.payload());
        match status {
            Some(StatusMessage::LinkAssociated(addr)) => {
                info!("wifi connected ({addr})");
                self.state.set_link_up(true);
            }
            Some(StatusMessage::ClientAttach(attached)) => {
                info!("wifi client connection status: {}", attached as u8);
                self.state.set_client_attached(attached);
            }
            Some(StatusMessage::Unknown(code)) => {
                debug!("ignoring unknown status code {code:#04x}");
                self.stats.ignored += 1;
                return None;
            }
            None => {
                debug!("ignoring short status packet ({} bytes)", packet.len());
                self.stats.ignored += 1;
                return None;
            }
        }

        self.stats.applied += 1;
        status
    }

    /// Receive and apply status packets until the link closes.
    pub async fn run(mut self) -> MonitorStats {
        while let Some(packet) = self.receiver.recv().await {
            self.handle_packet(&packet);
        }
        info!(
            received = self.stats.received,
            ignored = self.stats.ignored,
            "link closed, status monitor stopped"
        );
        self.stats
    }

    /// Run on its own task.
    pub fn spawn(self) -> JoinHandle<MonitorStats> {
        tokio::spawn(self.run())
    }
}
