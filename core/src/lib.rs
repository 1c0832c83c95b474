//! Myriad Core Library
//!
//! Provides the 80-byte block header, its binary codec, and the
//! multi-algorithm proof-of-work dispatch used to verify it.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

pub mod config;
pub mod error;
pub mod pow;

pub use error::{Error, Result};

/// A 32-byte hash in "display order" — the byte-reversed form used when a
/// hash is printed or compared as hex, matching the convention every header
/// field that carries a hash (`prev_block_hash`, the hash of a header, PoW
/// digests) uses throughout this crate.
pub type Hash = [u8; 32];

/// Wire size of an encoded header.
pub const HEADER_SIZE: usize = 80;

/// A Myriadcoin block header.
///
/// `prev_block_hash` and `merkle_root` are kept in display order (the
/// reverse of their on-wire byte order) so they can be compared directly
/// against hashes computed by [`Header::hash`], which are also display
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub prev_block_hash: Hash,
    pub merkle_root: Hash,
    pub timestamp: u32,
    pub bits: u32,
    pub nonce: u32,
    /// Height this header was announced at. Not part of the wire encoding;
    /// attached by the caller (the sync worker, or a chunk's implicit index
    /// arithmetic) once the header's position in the chain is known.
    pub block_height: Option<u64>,
}

impl Header {
    /// Serializes the header to its canonical 80-byte wire form: version,
    /// prev_block_hash (byte-reversed), merkle_root (byte-reversed),
    /// timestamp, bits, nonce — all little-endian.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..4].copy_from_slice(&self.version.to_le_bytes());
        let mut prev = self.prev_block_hash;
        prev.reverse();
        out[4..36].copy_from_slice(&prev);
        let mut merkle = self.merkle_root;
        merkle.reverse();
        out[36..68].copy_from_slice(&merkle);
        out[68..72].copy_from_slice(&self.timestamp.to_le_bytes());
        out[72..76].copy_from_slice(&self.bits.to_le_bytes());
        out[76..80].copy_from_slice(&self.nonce.to_le_bytes());
        out
    }

    /// Decodes a header from its 80-byte wire form. The caller is
    /// responsible for attaching `block_height` afterwards.
    pub fn from_bytes(b: &[u8; HEADER_SIZE]) -> Self {
        let mut prev_block_hash: Hash = b[4..36].try_into().expect("32 bytes");
        prev_block_hash.reverse();
        let mut merkle_root: Hash = b[36..68].try_into().expect("32 bytes");
        merkle_root.reverse();
        Header {
            version: u32::from_le_bytes(b[0..4].try_into().unwrap()),
            prev_block_hash,
            merkle_root,
            timestamp: u32::from_le_bytes(b[68..72].try_into().unwrap()),
            bits: u32::from_le_bytes(b[72..76].try_into().unwrap()),
            nonce: u32::from_le_bytes(b[76..80].try_into().unwrap()),
            block_height: None,
        }
    }

    /// Parses a header out of a longer buffer at byte offset `offset`,
    /// returning [`Error::ShortRead`] if fewer than 80 bytes remain.
    pub fn from_slice_at(buf: &[u8], offset: usize) -> Result<Self> {
        let end = offset.checked_add(HEADER_SIZE).ok_or(Error::ShortRead)?;
        let slice = buf.get(offset..end).ok_or(Error::ShortRead)?;
        let arr: [u8; HEADER_SIZE] = slice.try_into().map_err(|_| Error::ShortRead)?;
        Ok(Self::from_bytes(&arr))
    }

    /// SHA-256(SHA-256(header)), byte-reversed to display order. This is the
    /// block hash proper, and also the PoW hash for algorithm 2 (SHA-256D).
    pub fn hash_sha_d(&self) -> Hash {
        sha_d(&self.to_bytes())
    }

    /// The PoW algorithm this header claims, decoded from `version`.
    pub fn algo(&self) -> Result<pow::Algo> {
        pow::Algo::from_version(self.version)
    }
}

/// SHA-256(SHA-256(data)), byte-reversed to display order.
pub fn sha_d(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    let mut out: Hash = second.into();
    out.reverse();
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codec_round_trip_identity() {
        let header = Header {
            version: 2,
            prev_block_hash: [1u8; 32],
            merkle_root: [2u8; 32],
            timestamp: 123_456,
            bits: 0x1e0fffff,
            nonce: 42,
            block_height: None,
        };
        let encoded = header.to_bytes();
        let decoded = Header::from_bytes(&encoded);
        assert_eq!(header, decoded);
        assert_eq!(decoded.to_bytes(), encoded);
    }

    #[test]
    fn genesis_bits_constant_parses_as_algo_sha256d() {
        let header = Header {
            version: 2,
            prev_block_hash: [0u8; 32],
            merkle_root: [0u8; 32],
            timestamp: 0,
            bits: config::GENESIS_BITS,
            nonce: 0,
            block_height: Some(0),
        };
        assert_eq!(header.algo().unwrap(), pow::Algo::Sha256d);
    }

    #[test]
    fn short_slice_is_rejected() {
        let buf = [0u8; 40];
        assert!(matches!(
            Header::from_slice_at(&buf, 0),
            Err(Error::ShortRead)
        ));
    }
}
