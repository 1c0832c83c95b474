//! Error types for the **myriad-core** crate.
//!
//! All high-level operations return [`crate::Result`], a convenient alias
//! for `core::result::Result<T, Error>`. The variants correspond one-to-one
//! with the error kinds enumerated for the header-chain subsystem: a header
//! or chunk can fail to link, fail its PoW, disagree with the retarget
//! engine's expected `bits`, or name an algorithm this build doesn't know.
//!
//! # Examples
//!
//! ```
//! use myriad_core::{Error, Result};
//!
//! fn demo_fn(fail: bool) -> Result<()> {
//!     if fail {
//!         Err(Error::PoWInsufficient)
//!     } else {
//!         Ok(())
//!     }
//! }
//! ```

use thiserror::Error;

/// Core crate error type.
#[derive(Debug, Error)]
pub enum Error {
    /// The header file returned fewer than 80 bytes for a read at a given
    /// height — the height is past the tip, or the file is corrupt.
    #[error("short read from header file")]
    ShortRead,

    /// `version` did not decode to one of the recognized PoW algorithms.
    #[error("unknown PoW algorithm (version {0})")]
    UnknownAlgorithm(u32),

    /// `prev_block_hash` did not match the hash of the preceding header.
    #[error("header does not link to its predecessor")]
    LinkBroken,

    /// The header's declared `bits` disagrees with the retarget engine.
    #[error("bits mismatch: header has {header:#010x}, expected {expected:#010x}")]
    BitsMismatch { header: u32, expected: u32 },

    /// The PoW hash did not fall below the target.
    #[error("proof of work insufficient for target")]
    PoWInsufficient,

    /// A peer response carried an `error` field or an otherwise malformed
    /// shape.
    #[error("peer protocol error: {0}")]
    PeerProtocol(String),

    /// The algo index could not be queried (e.g. a sqlite error); callers in
    /// chunk mode fall back to reading `first` from the chunk buffer.
    #[error("algo index unavailable: {0}")]
    IndexUnavailable(String),

    /// A submitted chain or chunk was empty.
    #[error("chain or chunk was empty")]
    EmptyChain,

    /// The inbound announcement queue is at capacity.
    #[error("sync worker announcement queue is full")]
    QueueFull,

    /// Wraps lower-level I/O failures against the header file.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Convenient result alias used throughout the crate.
pub type Result<T> = core::result::Result<T, Error>;

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}
