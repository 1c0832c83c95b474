//! The sync worker (C7): the peer abstraction, announcement queue, and the
//! bulk-sync/tip-extend/reorg state machine.

pub mod peer;
pub mod worker;

pub use peer::{Peer, PeerHandle};
pub use worker::{Announcement, SyncHandle, SyncWorker};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use myriad_chain::ChainStore;
    use myriad_core::config::{Config, GENESIS_BITS};
    use myriad_core::pow::PowDispatcher;
    use myriad_core::{Header, Result, HEADER_SIZE};
    use myriad_store::{AlgoIndex, HeaderFile, NoSeed};
    use tempfile::tempdir;

    use super::*;

    fn header(version: u32, height: u64, prev_hash: [u8; 32], salt: u8) -> Header {
        Header {
            version,
            prev_block_hash: prev_hash,
            merkle_root: [salt; 32],
            timestamp: height as u32,
            bits: GENESIS_BITS,
            nonce: 0,
            block_height: Some(height),
        }
    }

    fn stub_dispatcher() -> PowDispatcher {
        let zero: Arc<dyn myriad_core::pow::PowBackend> = Arc::new(|_: &[u8; HEADER_SIZE]| [0u8; 32]);
        PowDispatcher::new([zero.clone(), zero.clone(), zero.clone(), zero.clone(), zero])
    }

    /// A fake peer serving headers and chunks out of an in-memory chain it
    /// was built from; used to drive the worker end to end without a real
    /// transport.
    struct FakePeer {
        id: String,
        chain: Vec<Header>,
    }

    #[async_trait::async_trait]
    impl Peer for FakePeer {
        fn id(&self) -> &str {
            &self.id
        }

        async fn request_header(&self, height: u64) -> Result<Header> {
            self.chain
                .iter()
                .find(|h| h.block_height == Some(height))
                .copied()
                .ok_or(myriad_core::Error::PeerProtocol("no such header".into()))
        }

        async fn get_chunk(&self, index: u64) -> Result<Vec<u8>> {
            let mut data = Vec::new();
            for h in self.chain.iter().filter(|h| h.block_height.unwrap() / 2016 == index) {
                data.extend_from_slice(&h.to_bytes());
            }
            Ok(data)
        }
    }

    #[tokio::test]
    async fn tip_extend_announcement_advances_height_and_notifies() {
        let dir = tempdir().unwrap();
        let path = dir.into_path().join("blockchain_headers");
        let genesis = header(2, 0, [0u8; 32], 0);
        let (store, _path) = new_store_with_genesis(&path, genesis);

        let cfg = Config::default();
        let (handle, join) = SyncWorker::spawn(store, stub_dispatcher(), cfg);
        let mut notifications = handle.subscribe();

        let h1 = header(2, 1, genesis.hash_sha_d(), 1);
        let peer: PeerHandle = Arc::new(FakePeer { id: "peer-a".into(), chain: vec![genesis, h1] });
        handle.enqueue(peer, h1).unwrap();

        let notified_height = tokio::time::timeout(std::time::Duration::from_secs(5), notifications.recv())
            .await
            .expect("notification within timeout")
            .unwrap();
        assert_eq!(notified_height, 1);
        assert_eq!(handle.height(), Some(1));

        handle.stop();
        let _ = join.await;
    }

    fn new_store_with_genesis(path: &std::path::Path, genesis: Header) -> (ChainStore, std::path::PathBuf) {
        let header_file = HeaderFile::open(path, &NoSeed).unwrap();
        let mut header_file = header_file;
        header_file.write_header(0, &genesis).unwrap();
        let algo_index = AlgoIndex::open_in_memory().unwrap();
        (ChainStore::new(header_file, algo_index), path.to_path_buf())
    }

    #[tokio::test]
    async fn reorg_walks_back_past_a_forked_ancestor() {
        let dir = tempdir().unwrap();
        let path = dir.into_path().join("blockchain_headers");
        let genesis = header(2, 0, [0u8; 32], 0);
        let (store, _path) = new_store_with_genesis(&path, genesis);

        let cfg = Config::default();
        let (handle, join) = SyncWorker::spawn(store, stub_dispatcher(), cfg);
        let mut notifications = handle.subscribe();

        // Chain A: heights 1..=3.
        let a1 = header(2, 1, genesis.hash_sha_d(), 0xA1);
        let a2 = header(2, 2, a1.hash_sha_d(), 0xA2);
        let a3 = header(2, 3, a2.hash_sha_d(), 0xA3);
        let peer_a: PeerHandle = Arc::new(FakePeer {
            id: "peer-a".into(),
            chain: vec![genesis, a1, a2, a3],
        });
        handle.enqueue(peer_a, a3).unwrap();
        tokio::time::timeout(std::time::Duration::from_secs(5), notifications.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(handle.height(), Some(3));

        // Chain B: diverges at height 2, same ancestor at height 1.
        let b2 = header(2, 2, a1.hash_sha_d(), 0xB2);
        let b3 = header(2, 3, b2.hash_sha_d(), 0xB3);
        let peer_b: PeerHandle = Arc::new(FakePeer {
            id: "peer-b".into(),
            chain: vec![genesis, a1, b2, b3],
        });
        handle.enqueue(peer_b, b3).unwrap();
        let notified_height = tokio::time::timeout(std::time::Duration::from_secs(5), notifications.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(notified_height, 3);
        let stored_at_2 = handle.read_header(2).unwrap().unwrap();
        assert_eq!(stored_at_2.hash_sha_d(), b2.hash_sha_d());

        handle.stop();
        let _ = join.await;
    }

    #[tokio::test]
    async fn stale_announcement_is_ignored() {
        let dir = tempdir().unwrap();
        let path = dir.into_path().join("blockchain_headers");
        let genesis = header(2, 0, [0u8; 32], 0);
        let (store, _path) = new_store_with_genesis(&path, genesis);

        let cfg = Config::default();
        let (handle, join) = SyncWorker::spawn(store, stub_dispatcher(), cfg);

        // Height 0 is not greater than the current tip (0): ignored, no
        // notification, and enqueue itself still succeeds.
        let peer: PeerHandle = Arc::new(FakePeer { id: "peer-a".into(), chain: vec![genesis] });
        handle.enqueue(peer, genesis).unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(handle.height(), Some(0));

        handle.stop();
        let _ = join.await;
    }
}
