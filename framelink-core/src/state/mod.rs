pub mod link;

pub use link::{LinkSnapshot, LinkStateReader, LinkStateWriter, link_state};
