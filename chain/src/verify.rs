//! The chain verifier (C6): `verify_chunk` and `verify_chain`.
//!
//! Both walk a sequence of headers checking hash-linkage, the declared
//! `bits` against the retarget engine, and the PoW threshold; both persist
//! only on total success (spec I1/I2/I6).

use myriad_core::config::Config;
use myriad_core::pow::{hash_as_u256, PowDispatcher};
use myriad_core::{Error, Hash, Header, Result, HEADER_SIZE};

use crate::retarget::{compute_retarget, RetargetStore};
use crate::store_adapter::ChainStore;

/// Verifies a 2016-header chunk at `index` against `data`, and persists it
/// (header file + algo index, already updated as a side effect of the
/// retarget calls) only if every header verifies.
pub fn verify_chunk(
    index: u64,
    data: &[u8],
    store: &mut ChainStore,
    dispatcher: &PowDispatcher,
    cfg: &Config,
) -> Result<()> {
    let num = data.len() as u64 / HEADER_SIZE as u64;
    if num == 0 {
        return Err(Error::EmptyChain);
    }

    let mut previous_hash: Hash = if index == 0 {
        [0u8; 32]
    } else {
        let boundary_height = index
            .checked_mul(cfg.chunk_size)
            .and_then(|h| h.checked_sub(1))
            .ok_or(Error::ShortRead)?;
        store
            .read_header(boundary_height)?
            .ok_or(Error::ShortRead)?
            .hash_sha_d()
    };

    for i in 0..num {
        let height = index * cfg.chunk_size + i;
        let (bits, target) = compute_retarget(height, None, Some(data), store, cfg)?;

        let offset = (i as usize) * HEADER_SIZE;
        let raw: [u8; HEADER_SIZE] = data[offset..offset + HEADER_SIZE]
            .try_into()
            .map_err(|_| Error::ShortRead)?;
        let mut header = Header::from_bytes(&raw);
        header.block_height = Some(height);
        let algo = header.algo()?;

        if previous_hash != header.prev_block_hash {
            return Err(Error::LinkBroken);
        }
        if bits != header.bits {
            return Err(Error::BitsMismatch { header: header.bits, expected: bits });
        }
        let pow_hash = dispatcher.hash(algo, &raw);
        if hash_as_u256(&pow_hash) >= target {
            return Err(Error::PoWInsufficient);
        }

        previous_hash = header.hash_sha_d();
    }

    store.header_file.write_chunk(index, cfg.chunk_size, data)?;
    log::info!("validated chunk {index}");
    Ok(())
}

/// Verifies a contiguous ascending chain of headers, all three assertions,
/// and persists every header only if the whole chain verifies.
pub fn verify_chain(
    chain: &[Header],
    store: &mut ChainStore,
    dispatcher: &PowDispatcher,
    cfg: &Config,
) -> Result<()> {
    let first = chain.first().ok_or(Error::EmptyChain)?;
    let first_height = first.block_height.ok_or(Error::ShortRead)?;
    let anchor_height = first_height.checked_sub(1).ok_or(Error::ShortRead)?;
    let mut prev_header = store.read_header(anchor_height)?.ok_or(Error::ShortRead)?;

    for header in chain {
        let height = header.block_height.ok_or(Error::ShortRead)?;
        let prev_hash = prev_header.hash_sha_d();
        let (bits, target) = compute_retarget(height, Some(chain), None, store, cfg)?;
        let algo = header.algo()?;
        let raw = header.to_bytes();

        if prev_hash != header.prev_block_hash {
            return Err(Error::LinkBroken);
        }
        if bits != header.bits {
            return Err(Error::BitsMismatch { header: header.bits, expected: bits });
        }
        let pow_hash = dispatcher.hash(algo, &raw);
        if hash_as_u256(&pow_hash) >= target {
            return Err(Error::PoWInsufficient);
        }

        prev_header = *header;
    }

    for header in chain {
        let height = header.block_height.expect("checked above");
        store.header_file.write_header(height, header)?;
    }
    log::info!(
        "chain verified, heights {}..={}",
        first_height,
        chain.last().unwrap().block_height.unwrap()
    );
    Ok(())
}
