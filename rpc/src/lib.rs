//! The jsonrpsee-based RPC facade (§6 "Public operations" of the
//! header-chain subsystem): `height`, `read_header`, `enqueue`, plus a
//! `new_blockchain_height` subscription mirroring the reference wallet's
//! `network.new_blockchain_height` callback.
//!
//! Grounded on the teacher's choice of `jsonrpsee` (server feature) for its
//! own `rpc` crate, which this subsystem fills in with real handlers — the
//! teacher's `rpc/Cargo.toml` had no source file to adapt, just the
//! dependency declaration.

use jsonrpsee::core::{async_trait, RpcResult, SubscriptionResult};
use jsonrpsee::proc_macros::rpc;
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, SubscriptionMessage};
use myriad_core::{Error, Header, Result as CoreResult};
use myriad_sync::{Peer, PeerHandle, SyncHandle};
use serde::{Deserialize, Serialize};

/// A JSON-friendly view of a [`Header`], hashes rendered as lowercase hex.
#[derive(Debug, Serialize, Deserialize)]
pub struct HeaderDto {
    pub version: u32,
    pub prev_block_hash: String,
    pub merkle_root: String,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    pub block_height: Option<u64>,
}

impl From<Header> for HeaderDto {
    fn from(h: Header) -> Self {
        Self {
            version: h.version,
            prev_block_hash: hex::encode(h.prev_block_hash),
            merkle_root: hex::encode(h.merkle_root),
            timestamp: h.timestamp,
            bits: h.bits,
            nonce: h.nonce,
            block_height: h.block_height,
        }
    }
}

/// Announcements submitted over this facade have no real peer behind them
/// to request missing ancestors from; they must already connect to the
/// known tip (or fall inside a chunk the caller also submits out of band).
/// Backfilling from arbitrary remote peers stays the job of a real P2P
/// transport, which is out of scope here.
struct LoopbackPeer;

#[async_trait::async_trait]
impl Peer for LoopbackPeer {
    fn id(&self) -> &str {
        "rpc-loopback"
    }

    async fn request_header(&self, _height: u64) -> CoreResult<Header> {
        Err(Error::PeerProtocol(
            "the RPC facade cannot backfill ancestors; submit a connecting header".into(),
        ))
    }

    async fn get_chunk(&self, _index: u64) -> CoreResult<Vec<u8>> {
        Err(Error::PeerProtocol(
            "the RPC facade cannot backfill chunks; submit a connecting header".into(),
        ))
    }
}

#[rpc(server)]
pub trait BlockchainRpc {
    /// The local tip height, or `None` if no headers are known yet.
    #[method(name = "height")]
    fn height(&self) -> RpcResult<Option<u64>>;

    /// Reads the header at `height`, if known.
    #[method(name = "read_header")]
    fn read_header(&self, height: u64) -> RpcResult<Option<HeaderDto>>;

    /// Submits a header announcement (hex-encoded, 80 bytes) at `height`.
    #[method(name = "enqueue")]
    fn enqueue(&self, height: u64, header_hex: String) -> RpcResult<()>;

    /// Fires once per accepted announcement, carrying the new height.
    #[subscription(name = "subscribe_new_blockchain_height" => "new_blockchain_height", item = u64)]
    async fn subscribe_new_blockchain_height(&self) -> SubscriptionResult;
}

pub struct BlockchainRpcServerImpl {
    sync: SyncHandle,
    loopback: PeerHandle,
}

impl BlockchainRpcServerImpl {
    pub fn new(sync: SyncHandle) -> Self {
        Self { sync, loopback: std::sync::Arc::new(LoopbackPeer) }
    }
}

fn rpc_err(e: Error) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(1, e.to_string(), None::<()>)
}

#[async_trait]
impl BlockchainRpcServer for BlockchainRpcServerImpl {
    fn height(&self) -> RpcResult<Option<u64>> {
        Ok(self.sync.height())
    }

    fn read_header(&self, height: u64) -> RpcResult<Option<HeaderDto>> {
        self.sync
            .read_header(height)
            .map(|opt| opt.map(HeaderDto::from))
            .map_err(rpc_err)
    }

    fn enqueue(&self, height: u64, header_hex: String) -> RpcResult<()> {
        let bytes = hex::decode(&header_hex)
            .map_err(|e| ErrorObjectOwned::owned(2, format!("invalid hex: {e}"), None::<()>))?;
        let raw: [u8; myriad_core::HEADER_SIZE] = bytes
            .try_into()
            .map_err(|_| ErrorObjectOwned::owned(3, "header must be exactly 80 bytes", None::<()>))?;
        let mut header = Header::from_bytes(&raw);
        header.block_height = Some(height);
        self.sync.enqueue(self.loopback.clone(), header).map_err(rpc_err)
    }

    async fn subscribe_new_blockchain_height(&self, pending: PendingSubscriptionSink) -> SubscriptionResult {
        let sink = pending.accept().await?;
        let mut rx = self.sync.subscribe();
        while let Ok(height) = rx.recv().await {
            let msg = SubscriptionMessage::from_json(&height)?;
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        Ok(())
    }
}
