//! Splitting payload regions into link-sized fragments.
//!
//! Fragment `n` covers `offset = n * capacity` up to `capacity` bytes.
//! Every fragment but the last of a region is exactly `capacity` long;
//! the last holds whatever remains. A region whose length is an exact
//! multiple of the capacity ends on a full fragment with nothing after
//! it, and an empty region produces no fragments at all.

use tracing::trace;

use crate::error::StreamError;
use crate::network::LinkSender;
use crate::packet::LinkPacket;
use crate::route::Route;

/// Number of fragments [`fragments`] yields for `len` bytes.
pub fn fragment_count(len: usize, capacity: usize) -> usize {
    len.div_ceil(capacity)
}

/// Consecutive chunks of `payload`, each at most `capacity` bytes.
///
/// # Panics
///
/// Panics if `capacity` is zero.
pub fn fragments(payload: &[u8], capacity: usize) -> std::slice::Chunks<'_, u8> {
    assert!(capacity > 0, "fragment capacity must be non-zero");
    payload.chunks(capacity)
}

/// Send every fragment of `region` as one packet. Returns the number
/// of packets sent.
pub async fn send_region(
    link: &LinkSender,
    src: Route,
    dst: Route,
    region: &[u8],
    capacity: usize,
) -> Result<usize, StreamError> {
    let mut sent = 0;
    for (part, chunk) in fragments(region, capacity).enumerate() {
        trace!(part, len = chunk.len(), "sending fragment");
        link.send(LinkPacket::from_slice(src, dst, chunk)?).await?;
        sent += 1;
    }
    Ok(sent)
}
