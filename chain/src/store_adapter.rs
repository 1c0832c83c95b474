//! Binds the flat header file and the sqlite algo index together behind the
//! [`RetargetStore`] trait the retarget engine needs, and exposes the read
//! path the chain verifier uses directly.

use myriad_core::{Header, Result, HEADER_SIZE};
use myriad_store::{AlgoIndex, HeaderFile};

use crate::retarget::RetargetStore;

/// The combined header file + algo index handle owned by the sync worker.
pub struct ChainStore {
    pub header_file: HeaderFile,
    pub algo_index: AlgoIndex,
}

impl ChainStore {
    pub fn new(header_file: HeaderFile, algo_index: AlgoIndex) -> Self {
        Self { header_file, algo_index }
    }

    pub fn tip_height(&self) -> Result<Option<u64>> {
        self.header_file.tip_height()
    }
}

impl RetargetStore for ChainStore {
    fn read_header(&mut self, height: u64) -> Result<Option<Header>> {
        self.header_file.read(height)
    }

    fn algo_count(&mut self, algo: u32, below_height: u64) -> Result<u64> {
        self.algo_index.count(algo, below_height)
    }

    fn algo_last_n_below(&mut self, algo: u32, below_height: u64, n: u32) -> Result<Vec<[u8; HEADER_SIZE]>> {
        self.algo_index.last_n_below(algo, below_height, n)
    }

    fn algo_insert_or_replace(&mut self, algo: u32, height: u64, raw: &[u8; HEADER_SIZE]) -> Result<()> {
        self.algo_index.insert_or_replace(algo, height, raw)
    }
}
