//! Replica Repair
//!
//! Propagates the authoritative contents to replicas that fell behind or
//! diverged. A clone lands the destination on exactly the source's
//! (digest, counter) pair: the destination's cached digest is cleared so
//! the digest-equal no-op check cannot suppress the write, and its counter
//! is set to one below the source so the write's increment matches it.

use std::fs::File;

use tracing::warn;

use crate::device::Replica;
use crate::error::Result;
use crate::store::lock::LockedPool;
use crate::store::quorum::Selection;

/// Write the source document into `replica` so it reports the source's
/// digest and counter afterwards.
///
/// The destination only borrows `document` for the duration of the write.
pub fn clone_into(
    replica: &mut Replica,
    file: &mut File,
    document: &[u8],
    counter: u64,
    zero_fill: bool,
) -> Result<()> {
    replica.sha256.clear();
    replica.write_counter = counter.checked_sub(1);
    replica.write_document(file, document, zero_fill)?;
    debug_assert_eq!(replica.write_counter, Some(counter));
    Ok(())
}

/// Bring every divergent replica into agreement with the selection.
///
/// A replica diverges when its counter is below the authoritative counter
/// or its stored digest differs; uninitialised devices count as both.
/// Returns how many replicas were repaired.
pub fn repair_pool(
    pool: &mut [Replica],
    locked: &mut LockedPool,
    selection: &Selection,
) -> Result<usize> {
    let mut repaired = 0;
    for i in 0..pool.len() {
        if i == selection.index {
            continue;
        }
        let behind = pool[i]
            .write_counter
            .map_or(true, |wc| wc < selection.counter);
        if behind || pool[i].sha256 != selection.digest {
            warn!(
                path = %pool[i].path.display(),
                "repairing replica with stale or mismatched contents"
            );
            clone_into(
                &mut pool[i],
                locked.file(i),
                &selection.document,
                selection.counter,
                false,
            )?;
            repaired += 1;
        }
    }
    Ok(repaired)
}

// =============================================================================
// Tests
// =============================================================================
