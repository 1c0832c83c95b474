//! Consensus and runtime configuration for **myriad-core**.
//!
//! The [`Config`] struct centralises the retarget constants and the tunables
//! the sync worker needs (bulk-sync trigger distance, queue capacity, header
//! file seed URL). It is constructed via the [`ConfigBuilder`] fluent builder
//! so callers customise only the fields they care about — tests in
//! particular shrink `chunk_size`/`bootstrap_threshold_height` to keep
//! fixtures small.
//!
//! ```
//! use myriad_core::config::Config;
//!
//! let cfg = Config::default();
//! assert_eq!(cfg.chunk_size, 2016);
//! ```

use primitive_types::U256;
use serde::{Deserialize, Serialize};

/// Compact `bits` encoding of the easiest possible target — the value every
/// genesis header, and every header before an algorithm has accrued 10
/// ancestors, is retargeted to.
pub const GENESIS_BITS: u32 = 0x1e0f_ffff;

/// The ceiling every computed target is clamped to. Matches the reference
/// wallet's `max_target` constant bit for bit.
pub fn max_target() -> U256 {
    U256::from_big_endian(&[
        0x00, 0x00, 0x0F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
        0xFF, 0xFF,
    ])
}

/// Runtime configuration shared across the header-chain subsystem.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Config {
    /// Desired seconds between retargets for a single algorithm
    /// (`30 * 5`).
    pub target_timespan: u32,

    /// Expected seconds spanned by 10 consecutive same-algo blocks
    /// (`10 * target_timespan`).
    pub avg_interval: u32,

    /// Number of headers per chunk.
    pub chunk_size: u64,

    /// Heights below this use the algo index's row count to decide
    /// whether the 10-ancestor bootstrap relief still applies; above it,
    /// ancestry is assumed sufficient.
    pub bootstrap_threshold_height: u64,

    /// Announcing a header more than this many blocks past the local tip
    /// triggers bulk chunk sync instead of tip-extend.
    pub bulk_sync_trigger_distance: u64,

    /// Capacity of the inbound announcement queue feeding the sync worker.
    pub queue_capacity: usize,

    /// Fixed URL a pre-baked header file is fetched from on first run.
    /// Failure to fetch is recoverable; the subsystem starts with an empty
    /// file.
    pub headers_seed_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_timespan: 30 * 5,
            avg_interval: 10 * (30 * 5),
            chunk_size: 2016,
            bootstrap_threshold_height: 10_000,
            bulk_sync_trigger_distance: 50,
            queue_capacity: 1024,
            headers_seed_url: "http://myr.electr.us/blockchain_headers".into(),
        }
    }
}

/// Fluent builder for [`Config`].
pub struct ConfigBuilder {
    inner: Config,
}

impl ConfigBuilder {
    /// Starts a new builder pre-populated with [`Config::default`].
    pub fn new() -> Self {
        Self { inner: Config::default() }
    }

    pub fn target_timespan(mut self, secs: u32) -> Self {
        self.inner.target_timespan = secs;
        self
    }

    pub fn avg_interval(mut self, secs: u32) -> Self {
        self.inner.avg_interval = secs;
        self
    }

    pub fn chunk_size(mut self, size: u64) -> Self {
        self.inner.chunk_size = size;
        self
    }

    pub fn bootstrap_threshold_height(mut self, height: u64) -> Self {
        self.inner.bootstrap_threshold_height = height;
        self
    }

    pub fn bulk_sync_trigger_distance(mut self, distance: u64) -> Self {
        self.inner.bulk_sync_trigger_distance = distance;
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.inner.queue_capacity = capacity;
        self
    }

    pub fn headers_seed_url<S: Into<String>>(mut self, url: S) -> Self {
        self.inner.headers_seed_url = url.into();
        self
    }

    /// Consumes the builder returning an immutable configuration value.
    pub fn finish(self) -> Config {
        self.inner
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_fields() {
        let cfg = ConfigBuilder::new()
            .chunk_size(16)
            .bootstrap_threshold_height(100)
            .finish();
        assert_eq!(cfg.chunk_size, 16);
        assert_eq!(cfg.bootstrap_threshold_height, 100);
    }

    #[test]
    fn max_target_matches_reference_constant() {
        let t = max_target();
        assert_eq!(
            format!("{:064x}", t),
            "00000fffffffffffffffffffffffffffffffffffffffffffffffffffffffff"
        );
    }
}
