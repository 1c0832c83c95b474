//! The sync worker (C7): a single task draining an inbound announcement
//! queue, deciding between a tip-extend walk-back and a bulk chunk sync,
//! and persisting through `myriad-chain`'s verifier.
//!
//! Grounded on `Blockchain.run`/`get_chain`/`get_and_verify_chunks` in the
//! reference wallet. The thread-plus-`Queue.Queue` shape there becomes one
//! `tokio::task` plus a bounded `mpsc` channel; `running`/`is_running()`
//! stays an `AtomicBool` polled between queue items rather than a
//! cancellation token, since that is the behavior being preserved, not
//! upgraded.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use myriad_chain::{verify_chain, verify_chunk, ChainStore};
use myriad_core::config::Config;
use myriad_core::pow::PowDispatcher;
use myriad_core::{Error, Header, Result};
use myriad_store::HeaderFile;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::peer::{Peer, PeerHandle};

/// An inbound header announcement: the peer it came from, and the header.
pub type Announcement = (PeerHandle, Header);

/// The running worker's state. Not exposed directly — [`SyncWorker::spawn`]
/// consumes it and hands back a [`SyncHandle`].
pub struct SyncWorker {
    store: ChainStore,
    dispatcher: PowDispatcher,
    cfg: Config,
    local_height: Arc<AtomicI64>,
    running: Arc<AtomicBool>,
    inbound: mpsc::Receiver<Announcement>,
    height_tx: broadcast::Sender<u64>,
}

/// A cheaply-clonable handle to a running (or stopped) sync worker.
#[derive(Clone)]
pub struct SyncHandle {
    inbound: mpsc::Sender<Announcement>,
    running: Arc<AtomicBool>,
    local_height: Arc<AtomicI64>,
    height_tx: broadcast::Sender<u64>,
    header_file_path: PathBuf,
}

impl SyncHandle {
    /// The local tip height, or `None` if no headers are known yet.
    pub fn height(&self) -> Option<u64> {
        let h = self.local_height.load(Ordering::SeqCst);
        if h < 0 {
            None
        } else {
            Some(h as u64)
        }
    }

    /// Reads the header at `height` via a fresh read-only handle onto the
    /// header file — readers never share the worker's writer handle.
    pub fn read_header(&self, height: u64) -> Result<Option<Header>> {
        HeaderFile::open_read_only(&self.header_file_path)?.read(height)
    }

    /// Enqueues an announcement for the worker to process. Fails with
    /// [`Error::QueueFull`] under backpressure rather than blocking the
    /// caller, and with [`Error::PeerProtocol`] if the worker has stopped.
    pub fn enqueue(&self, peer: PeerHandle, header: Header) -> Result<()> {
        self.inbound.try_send((peer, header)).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => Error::QueueFull,
            mpsc::error::TrySendError::Closed(_) => {
                Error::PeerProtocol("sync worker is not running".into())
            }
        })
    }

    /// Signals the worker to stop after its current item. Matches the
    /// reference wallet's `stop()`/`is_running()` pair: this does not
    /// interrupt an in-flight peer request.
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Subscribes to `new_blockchain_height` notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<u64> {
        self.height_tx.subscribe()
    }
}

impl SyncWorker {
    /// Spawns the worker as a single tokio task and returns a handle to it
    /// plus its `JoinHandle`, for callers that want to await a clean stop.
    pub fn spawn(store: ChainStore, dispatcher: PowDispatcher, cfg: Config) -> (SyncHandle, JoinHandle<()>) {
        let header_file_path = store.header_file.path().to_path_buf();
        let local_height = Arc::new(AtomicI64::new(
            store.tip_height().ok().flatten().map(|h| h as i64).unwrap_or(-1),
        ));
        let running = Arc::new(AtomicBool::new(true));
        let (inbound_tx, inbound_rx) = mpsc::channel(cfg.queue_capacity);
        let (height_tx, _) = broadcast::channel(cfg.queue_capacity.max(16));

        let handle = SyncHandle {
            inbound: inbound_tx,
            running: running.clone(),
            local_height: local_height.clone(),
            height_tx: height_tx.clone(),
            header_file_path,
        };

        let worker = SyncWorker {
            store,
            dispatcher,
            cfg,
            local_height,
            running,
            inbound: inbound_rx,
            height_tx,
        };

        let join = tokio::spawn(worker.run());
        (handle, join)
    }

    async fn run(mut self) {
        log::info!(
            "sync worker starting at height {:?}",
            self.local_height.load(Ordering::SeqCst)
        );
        while self.running.load(Ordering::SeqCst) {
            let Some((peer, header)) = self.inbound.recv().await else {
                break;
            };
            if let Err(e) = self.handle_announcement(peer.clone(), header).await {
                log::warn!("announcement from {} failed: {e}", peer.id());
            }
        }
        self.running.store(false, Ordering::SeqCst);
        log::info!("sync worker stopped");
    }

    async fn handle_announcement(&mut self, peer: PeerHandle, header: Header) -> Result<()> {
        let height = header
            .block_height
            .ok_or_else(|| Error::PeerProtocol("announced header has no height".into()))?;
        let local = self.local_height.load(Ordering::SeqCst);

        if local >= 0 && height as i64 <= local {
            return Ok(());
        }

        if local >= 0 && height as i64 > local + self.cfg.bulk_sync_trigger_distance as i64 {
            if let Err(e) = self.bulk_sync_chunks(peer.as_ref(), height).await {
                log::warn!("bulk chunk sync from {} failed: {e}", peer.id());
                return Ok(());
            }
        }

        let local_after_bulk = self.local_height.load(Ordering::SeqCst);
        if local_after_bulk < 0 || height as i64 > local_after_bulk {
            let chain = match self.get_chain(peer.as_ref(), header).await? {
                Some(chain) => chain,
                None => {
                    log::warn!("could not connect announced chain from {}", peer.id());
                    return Ok(());
                }
            };
            if let Err(e) = verify_chain(&chain, &mut self.store, &self.dispatcher, &self.cfg) {
                log::warn!("chain from {} failed verification: {e}", peer.id());
                return Ok(());
            }
            let new_tip = chain.last().and_then(|h| h.block_height).expect("non-empty chain");
            self.local_height.store(new_tip as i64, Ordering::SeqCst);
        }

        let _ = self.height_tx.send(height);
        Ok(())
    }

    /// Walks backward from `final_header` requesting missing ancestors from
    /// `peer` until the chain connects to the local store (or a reorg point
    /// is found), returning the connecting suffix in ascending order.
    async fn get_chain(&mut self, peer: &dyn Peer, final_header: Header) -> Result<Option<Vec<Header>>> {
        let mut chain = vec![final_header];
        let mut header = final_header;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Ok(None);
            }
            let height = header
                .block_height
                .ok_or_else(|| Error::PeerProtocol("header has no height".into()))?;
            if height == 0 {
                return Ok(Some(chain));
            }
            match self.store.header_file.read(height - 1)? {
                None => {
                    let fetched = peer.request_header(height - 1).await?;
                    chain.insert(0, fetched);
                    header = fetched;
                }
                Some(previous) if previous.hash_sha_d() == header.prev_block_hash => {
                    return Ok(Some(chain));
                }
                Some(_) => {
                    log::warn!("reorg: walking back past height {height}");
                    let fetched = peer.request_header(height - 1).await?;
                    chain.insert(0, fetched);
                    header = fetched;
                }
            }
        }
    }

    /// Requests and verifies whole chunks from `peer` until the local tip
    /// reaches `target_height`'s chunk. A chunk that fails verification is
    /// retried by stepping the index back one — matching the reference
    /// wallet's retry shape exactly, bug-compatible edge case included: a
    /// persistently failing chunk walks the index down to -1 and aborts
    /// rather than retrying forever.
    async fn bulk_sync_chunks(&mut self, peer: &dyn Peer, target_height: u64) -> Result<()> {
        let local = self.local_height.load(Ordering::SeqCst);
        let chunk_size = self.cfg.chunk_size;
        let min_index = ((local + 1) as u64) / chunk_size;
        let max_index = (target_height + 1) / chunk_size;

        let mut n = min_index as i64;
        while n < max_index as i64 + 1 {
            if !self.running.load(Ordering::SeqCst) {
                return Err(Error::PeerProtocol("worker stopped during chunk sync".into()));
            }
            log::debug!("requesting chunk {n} from {}", peer.id());
            let data = peer.get_chunk(n as u64).await?;
            match verify_chunk(n as u64, &data, &mut self.store, &self.dispatcher, &self.cfg) {
                Ok(()) => {
                    let tip = self.store.tip_height()?.map(|h| h as i64).unwrap_or(-1);
                    self.local_height.store(tip, Ordering::SeqCst);
                    n += 1;
                }
                Err(e) => {
                    log::warn!("chunk {n} failed verification: {e}");
                    n -= 1;
                    if n < 0 {
                        return Err(Error::PeerProtocol("chunk sync failed below index 0".into()));
                    }
                }
            }
        }
        Ok(())
    }
}
