//! Connection state shared between the status monitor and the pipeline.
//!
//! [`link_state`] hands out exactly one [`LinkStateWriter`]; it is not
//! `Clone`, so the status monitor that owns it is the only task able to
//! change the flags. Readers are free to clone.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Default)]
struct Flags {
    link_up: AtomicBool,
    client_attached: AtomicBool,
}

/// Create the shared state with both flags cleared.
pub fn link_state() -> (LinkStateWriter, LinkStateReader) {
    let flags = Arc::new(Flags::default());
    (
        LinkStateWriter {
            flags: Arc::clone(&flags),
        },
        LinkStateReader { flags },
    )
}

/// Point-in-time copy of both flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkSnapshot {
    pub link_up: bool,
    pub client_attached: bool,
}

/// Sole mutator of the connection flags.
#[derive(Debug)]
pub struct LinkStateWriter {
    flags: Arc<Flags>,
}

impl LinkStateWriter {
    pub fn set_link_up(&self, up: bool) {
        self.flags.link_up.store(up, Ordering::Release);
    }

    pub fn set_client_attached(&self, attached: bool) {
        self.flags.client_attached.store(attached, Ordering::Release);
    }
}

/// Read-only view of the connection flags.
#[derive(Debug, Clone)]
pub struct LinkStateReader {
    flags: Arc<Flags>,
}

impl LinkStateReader {
    pub fn link_up(&self) -> bool {
        self.flags.link_up.load(Ordering::Acquire)
    }

    /// The transmission gate.
    pub fn client_attached(&self) -> bool {
        self.flags.client_attached.load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> LinkSnapshot {
        LinkSnapshot {
            link_up: self.link_up(),
            client_attached: self.client_attached(),
        }
    }
}
