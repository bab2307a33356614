pub mod connection;

pub use connection::{LINK_QUEUE_DEPTH, LinkConnection, LinkReceiver, LinkSender};
