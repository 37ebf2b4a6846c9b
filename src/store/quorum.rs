//! Quorum Selector
//!
//! Decides which replica to trust after an unclean shutdown. The most
//! recent completed write carries the highest write counter, and the digest
//! check screens out torn or corrupted writes pretending to be that latest
//! attempt. Devices without a metadata signature contribute no counter and
//! can never be selected; they are brought back by repair.

use tracing::{debug, info, warn};

use crate::device::footer::FooterState;
use crate::device::Replica;
use crate::digest::sha256_hex;
use crate::error::{Error, Result};
use crate::store::lock::LockedPool;

/// The authoritative replica together with its verified content.
#[derive(Debug)]
pub struct Selection {
    /// Pool index of the authoritative replica
    pub index: usize,
    /// Verified document bytes
    pub document: Vec<u8>,
    /// Content digest, equal to the stored footer digest
    pub digest: String,
    /// Write counter the selection was made at
    pub counter: u64,
}

/// Choose the authoritative replica from the locked pool.
///
/// Reads every footer (uninitialised devices are ignored, I/O failures are
/// fatal), keeps the subset at the maximum write counter, and returns the
/// first of those, in pool order, whose content digest matches its footer.
/// Candidates that fail the digest check have their buffer dropped
/// immediately; only the winner's content is kept.
pub fn select_authoritative(pool: &mut [Replica], locked: &mut LockedPool) -> Result<Selection> {
    let mut usable = vec![false; pool.len()];
    for (i, flag) in usable.iter_mut().enumerate() {
        match pool[i].load_footer(locked.file(i))? {
            FooterState::Valid { .. } => *flag = true,
            FooterState::BadMagic => {
                debug!(
                    path = %pool[i].path.display(),
                    "no metadata signature, ignoring for selection"
                );
            }
        }
    }

    let highest = pool
        .iter()
        .zip(&usable)
        .filter(|(_, ok)| **ok)
        .filter_map(|(r, _)| r.write_counter)
        .max();
    let Some(highest) = highest else {
        return Err(Error::NoGoodDevices);
    };

    for i in 0..pool.len() {
        if !usable[i] || pool[i].write_counter != Some(highest) {
            continue;
        }
        let document = pool[i].read_document(locked.file(i))?;
        let computed = sha256_hex(&document);
        if computed == pool[i].sha256 {
            info!(
                path = %pool[i].path.display(),
                counter = highest,
                "selected authoritative replica"
            );
            return Ok(Selection {
                index: i,
                document,
                digest: computed,
                counter: highest,
            });
        }
        warn!(
            path = %pool[i].path.display(),
            "candidate replica failed its digest check"
        );
        // `document` drops here; a failed candidate keeps nothing
    }

    Err(Error::NoGoodDevices)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const BS: usize = 128;
    const BLOCKS: usize = 8;

    fn pool_fixture(dir: &tempfile::TempDir, names: &[&str]) -> Vec<Replica> {
        names
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                let mut file = std::fs::File::create(&path).unwrap();
                file.write_all(&vec![0u8; BS * BLOCKS]).unwrap();
                Replica::new(path, BS, BLOCKS)
            })
            .collect()
    }

    fn write_doc(pool: &mut [Replica], locked: &mut LockedPool, index: usize, doc: &[u8]) {
        pool[index].sha256.clear();
        pool[index]
            .write_document(locked.file(index), doc, false)
            .unwrap();
    }

    #[test]
    fn test_blank_pool_has_no_good_devices() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_fixture(&dir, &["e0", "e1"]);
        let mut locked = LockedPool::acquire(&pool).unwrap();

        assert!(matches!(
            select_authoritative(&mut pool, &mut locked),
            Err(Error::NoGoodDevices)
        ));
    }

    #[test]
    fn test_highest_counter_wins() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_fixture(&dir, &["e0", "e1"]);
        let mut locked = LockedPool::acquire(&pool).unwrap();

        write_doc(&mut pool, &mut locked, 0, b"{\"v\":\"old\"}");
        write_doc(&mut pool, &mut locked, 1, b"{\"v\":\"old\"}");
        write_doc(&mut pool, &mut locked, 1, b"{\"v\":\"new\"}");

        let selection = select_authoritative(&mut pool, &mut locked).unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(selection.document, b"{\"v\":\"new\"}");
        assert_eq!(selection.counter, 1);
    }

    #[test]
    fn test_pool_order_breaks_counter_ties() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_fixture(&dir, &["e0", "e1"]);
        let mut locked = LockedPool::acquire(&pool).unwrap();

        write_doc(&mut pool, &mut locked, 0, b"{\"v\":\"a\"}");
        write_doc(&mut pool, &mut locked, 1, b"{\"v\":\"a\"}");

        let selection = select_authoritative(&mut pool, &mut locked).unwrap();
        assert_eq!(selection.index, 0);
    }

    #[test]
    fn test_corrupt_candidate_skipped_in_favor_of_peer() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_fixture(&dir, &["e0", "e1"]);
        let mut locked = LockedPool::acquire(&pool).unwrap();

        write_doc(&mut pool, &mut locked, 0, b"{\"v\":\"a\"}");
        write_doc(&mut pool, &mut locked, 1, b"{\"v\":\"a\"}");

        // Flip a data byte on the first device so its digest no longer holds
        use std::io::{Seek, SeekFrom};
        locked.file(0).seek(SeekFrom::Start(2)).unwrap();
        locked.file(0).write_all(b"X").unwrap();

        let selection = select_authoritative(&mut pool, &mut locked).unwrap();
        assert_eq!(selection.index, 1);
        assert_eq!(selection.document, b"{\"v\":\"a\"}");
    }

    #[test]
    fn test_uninitialised_device_never_selected() {
        let dir = tempfile::tempdir().unwrap();
        let mut pool = pool_fixture(&dir, &["e0", "e1"]);
        let mut locked = LockedPool::acquire(&pool).unwrap();

        write_doc(&mut pool, &mut locked, 1, b"{\"v\":\"only\"}");

        let selection = select_authoritative(&mut pool, &mut locked).unwrap();
        assert_eq!(selection.index, 1);
    }
}
