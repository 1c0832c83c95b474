//! The narrow request/reply abstraction the sync worker needs from a
//! network layer it never imports directly — mirroring how the reference
//! wallet's worker thread only ever calls methods on the `interface` object
//! handed to it, never a socket type.

use std::fmt;
use std::sync::Arc;

use myriad_core::{Header, Result};

/// One connected peer, as seen by the sync worker. `request_header` models
/// `blockchain.block.get_header`; `get_chunk` models
/// `blockchain.block.get_chunk`.
#[async_trait::async_trait]
pub trait Peer: Send + Sync {
    /// A short, loggable identifier for this peer (its server address, in
    /// the reference wallet).
    fn id(&self) -> &str;

    /// Fetches the header at `height` from this peer.
    async fn request_header(&self, height: u64) -> Result<Header>;

    /// Fetches the raw 2016-header chunk at `index` from this peer.
    async fn get_chunk(&self, index: u64) -> Result<Vec<u8>>;
}

impl fmt::Debug for dyn Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Peer({})", self.id())
    }
}

/// A shared handle to a connected peer, cheap to clone and pass through the
/// announcement queue.
pub type PeerHandle = Arc<dyn Peer>;
