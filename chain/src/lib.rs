//! Chain verification: the per-algorithm retarget engine (C5) and the
//! chunk/chain verifier (C6).

pub mod retarget;
pub mod store_adapter;
pub mod verify;

pub use retarget::{compute_retarget, pack_bits, unpack_bits, RetargetStore};
pub use store_adapter::ChainStore;
pub use verify::{verify_chain, verify_chunk};
