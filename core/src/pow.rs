//! Proof-of-Work dispatch.
//!
//! Myriadcoin headers are mined under one of five distinct PoW hash
//! functions, selected by the header's `version` field. [`Algo`] is the
//! closed tagged set; [`PowBackend`] is the "injected capability object" the
//! design calls for — each algorithm is a pure `&[u8; 80] -> [u8; 32]`
//! function with no shared state, so tests (and fixtures using stub PoW
//! functions, per the subsystem's end-to-end test scenarios) can swap in a
//! double for any algorithm without touching the dispatch logic.
//!
//! All functions here are pure and stateless so they can be used from any
//! thread.

use std::sync::Arc;

use primitive_types::U256;
use sha2::{Digest, Sha256};

use crate::{sha_d, Error, Hash, Result, HEADER_SIZE};

/// The closed set of PoW algorithms a header's `version` field may select.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algo {
    Sha256d,
    Scrypt,
    Groestl,
    Skein,
    Qubit,
}

impl Algo {
    /// Decodes the algorithm a header's `version` field selects.
    pub fn from_version(version: u32) -> Result<Self> {
        match version {
            2 => Ok(Algo::Sha256d),
            514 => Ok(Algo::Scrypt),
            1026 => Ok(Algo::Groestl),
            1538 => Ok(Algo::Skein),
            2050 => Ok(Algo::Qubit),
            other => Err(Error::UnknownAlgorithm(other)),
        }
    }

    /// The `version` value this algorithm is selected by.
    pub fn version(self) -> u32 {
        match self {
            Algo::Sha256d => 2,
            Algo::Scrypt => 514,
            Algo::Groestl => 1026,
            Algo::Skein => 1538,
            Algo::Qubit => 2050,
        }
    }
}

/// A PoW hash function over the 80 encoded header bytes, returning a 32-byte
/// digest in display order.
pub trait PowBackend: Send + Sync {
    fn hash(&self, header_bytes: &[u8; HEADER_SIZE]) -> Hash;
}

impl<F: Fn(&[u8; HEADER_SIZE]) -> Hash + Send + Sync> PowBackend for F {
    fn hash(&self, header_bytes: &[u8; HEADER_SIZE]) -> Hash {
        self(header_bytes)
    }
}

/// SHA-256D of the serialized header — identical to the block hash.
pub struct Sha256dBackend;

impl PowBackend for Sha256dBackend {
    fn hash(&self, header_bytes: &[u8; HEADER_SIZE]) -> Hash {
        sha_d(header_bytes)
    }
}

/// scrypt(N=1024, r=1, p=1, dklen=32) of the serialized header.
pub struct ScryptBackend;

impl PowBackend for ScryptBackend {
    fn hash(&self, header_bytes: &[u8; HEADER_SIZE]) -> Hash {
        // log2(1024) == 10.
        let params = scrypt::Params::new(10, 1, 1, 32).expect("static scrypt params are valid");
        let mut out = [0u8; 32];
        scrypt::scrypt(header_bytes, header_bytes, &params, &mut out)
            .expect("scrypt output length matches buffer");
        out.reverse();
        out
    }
}

/// Groestl-512 of the serialized header, truncated to its first 256 bits.
pub struct GroestlBackend;

impl PowBackend for GroestlBackend {
    fn hash(&self, header_bytes: &[u8; HEADER_SIZE]) -> Hash {
        let digest = groestl::Groestl512::digest(header_bytes);
        let mut out: Hash = digest[..32].try_into().expect("32 bytes");
        out.reverse();
        out
    }
}

/// Binds each [`Algo`] to a [`PowBackend`] and dispatches by header version.
///
/// Every backend is an injected capability (`Arc<dyn PowBackend>`), matching
/// the design notes' treatment of the PoW hash libraries as process-wide
/// modules that should be represented as test-doubleable objects rather than
/// free functions baked into the dispatcher.
pub struct PowDispatcher {
    backends: [Arc<dyn PowBackend>; 5],
}

impl PowDispatcher {
    /// Builds a dispatcher from five explicit backends, one per [`Algo`] in
    /// declaration order (Sha256d, Scrypt, Groestl, Skein, Qubit).
    pub fn new(backends: [Arc<dyn PowBackend>; 5]) -> Self {
        Self { backends }
    }

    /// Builds a dispatcher using the real SHA-256D, scrypt, and Groestl
    /// backends. Skein and Qubit have no maintained crates.io
    /// implementation (Qubit is itself a 6-algorithm composite unique to
    /// multi-algo forks); callers must supply those two as injected
    /// capabilities, wired up at the application layer from an external
    /// FFI crate the wallet embeds — outside this subsystem's scope, same
    /// as the peer transport itself.
    pub fn production(
        skein: Arc<dyn PowBackend>,
        qubit: Arc<dyn PowBackend>,
    ) -> Self {
        Self::new([
            Arc::new(Sha256dBackend),
            Arc::new(ScryptBackend),
            Arc::new(GroestlBackend),
            skein,
            qubit,
        ])
    }

    /// Computes the PoW hash for `header_bytes` under `algo`.
    pub fn hash(&self, algo: Algo, header_bytes: &[u8; HEADER_SIZE]) -> Hash {
        self.backends[algo_index(algo)].hash(header_bytes)
    }
}

fn algo_index(algo: Algo) -> usize {
    match algo {
        Algo::Sha256d => 0,
        Algo::Scrypt => 1,
        Algo::Groestl => 2,
        Algo::Skein => 3,
        Algo::Qubit => 4,
    }
}

/// Interprets a display-order 32-byte PoW digest as a big-endian 256-bit
/// unsigned integer, for comparison against a target.
pub fn hash_as_u256(hash: &Hash) -> U256 {
    U256::from_big_endian(hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop_backend() -> Arc<dyn PowBackend> {
        Arc::new(|_: &[u8; HEADER_SIZE]| [0u8; 32])
    }

    #[test]
    fn algo_round_trips_through_version() {
        for algo in [
            Algo::Sha256d,
            Algo::Scrypt,
            Algo::Groestl,
            Algo::Skein,
            Algo::Qubit,
        ] {
            assert_eq!(Algo::from_version(algo.version()).unwrap(), algo);
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        assert!(matches!(
            Algo::from_version(7),
            Err(Error::UnknownAlgorithm(7))
        ));
    }

    #[test]
    fn sha256d_backend_matches_header_hash() {
        let dispatcher = PowDispatcher::production(noop_backend(), noop_backend());
        let bytes = [7u8; HEADER_SIZE];
        assert_eq!(dispatcher.hash(Algo::Sha256d, &bytes), sha_d(&bytes));
    }

    #[test]
    fn scrypt_and_groestl_backends_are_deterministic() {
        let dispatcher = PowDispatcher::production(noop_backend(), noop_backend());
        let bytes = [3u8; HEADER_SIZE];
        let a = dispatcher.hash(Algo::Scrypt, &bytes);
        let b = dispatcher.hash(Algo::Scrypt, &bytes);
        assert_eq!(a, b);
        let c = dispatcher.hash(Algo::Groestl, &bytes);
        let d = dispatcher.hash(Algo::Groestl, &bytes);
        assert_eq!(c, d);
        assert_ne!(a, c);
    }

    #[test]
    fn injected_skein_capability_is_used() {
        let dispatcher = PowDispatcher::production(Arc::new(|_: &[u8; HEADER_SIZE]| [0xAAu8; 32]), noop_backend());
        let bytes = [1u8; HEADER_SIZE];
        assert_eq!(dispatcher.hash(Algo::Skein, &bytes), [0xAAu8; 32]);
    }

    #[test]
    fn all_backends_overridable_with_stub_dispatcher() {
        let stub: Arc<dyn PowBackend> = Arc::new(|_: &[u8; HEADER_SIZE]| [0u8; 32]);
        let dispatcher = PowDispatcher::new([
            stub.clone(),
            stub.clone(),
            stub.clone(),
            stub.clone(),
            stub,
        ]);
        let bytes = [0xFFu8; HEADER_SIZE];
        for algo in [Algo::Sha256d, Algo::Scrypt, Algo::Groestl, Algo::Skein, Algo::Qubit] {
            assert_eq!(dispatcher.hash(algo, &bytes), [0u8; 32]);
        }
    }
}
