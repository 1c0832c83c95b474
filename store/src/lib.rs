//! Persistent storage for the header-chain subsystem: the linear header
//! file (C3) and the sqlite-backed algo index (C4).

pub mod algo_index;
pub mod header_file;

pub use algo_index::AlgoIndex;
pub use header_file::{HeaderFile, HeaderFileSeed, NoSeed};
