//! Replicated Store
//!
//! The public face of the engine. One `EepromStore` owns the replica pool
//! and the cached authoritative document; every operation runs under the
//! store's process-wide mutex and, for anything touching devices, under
//! exclusive advisory locks on every replica.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        EepromStore                           │
//! │   mutex ─► replica locks ─► freshness check ─► operation     │
//! └──────────────────────────────────────────────────────────────┘
//!          │                    │                     │
//!          ▼                    ▼                     ▼
//!     lock manager       quorum selector        replica I/O
//!                        + repair sweep
//! ```
//!
//! The freshness check is what keeps a cached document honest across
//! processes: after taking the locks, the authoritative footer is re-read,
//! and if another process advanced it (or the device degraded) the quorum
//! selection and repair sweep rerun before the operation proceeds.

pub mod lock;
pub mod quorum;
pub mod repair;

#[cfg(test)]
mod proptest;

use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::device::footer::{self, FooterState};
use crate::device::{DeviceInfo, Replica};
use crate::digest::sha256_hex;
use crate::document::Document;
use crate::error::{Error, Result};
use lock::LockedPool;
use quorum::Selection;

// =============================================================================
// Options and Statuses
// =============================================================================

/// Options for the set operation.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOptions {
    /// Fail instead of creating the key when it is absent
    pub no_create: bool,
    /// Zero-fill the entire device before writing (slow)
    pub zero_fill: bool,
}

/// Outcome of a verify sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyStatus {
    /// Every replica passed its first check
    AllPassed,
    /// At least one replica failed but all were successfully repaired
    Repaired,
}

impl VerifyStatus {
    /// Numeric form used by the CLI: 1 for a clean pass, 2 after repairs.
    /// 0 is reserved for an authoritative replica becoming unverifiable
    /// between operations, which the engine does not produce.
    pub fn code(&self) -> i32 {
        match self {
            VerifyStatus::AllPassed => 1,
            VerifyStatus::Repaired => 2,
        }
    }
}

// =============================================================================
// Store
// =============================================================================

/// Cached authoritative state, established by selection or clear.
#[derive(Debug)]
struct ActiveState {
    /// Pool index of the authoritative replica
    authoritative: usize,
    /// The document bytes the store treats as truth
    document: Vec<u8>,
    /// Digest of `document`
    digest: String,
    /// Write counter the pool agreed on
    counter: u64,
}

#[derive(Debug)]
struct StoreInner {
    pool: Vec<Replica>,
    capacity: usize,
    state: Option<ActiveState>,
}

/// Replicated key-value store over a pool of EEPROM devices.
///
/// Created from a configuration, used through `&self` methods (the inner
/// mutex serialises them), dropped to shut down. All methods that touch
/// devices take the advisory locks for their full duration.
pub struct EepromStore {
    inner: Mutex<StoreInner>,
}

impl EepromStore {
    /// Build a store from the configuration file at `path`.
    ///
    /// No device I/O happens here; the pool is first touched by
    /// [`initialize`](Self::initialize) or lazily by the first operation.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::from_config(Config::load(path)?))
    }

    /// Build a store from an already-parsed configuration.
    pub fn from_config(config: Config) -> Self {
        let capacity = config.capacity();
        let pool = config.build_pool();
        info!(replicas = pool.len(), capacity, "replica pool configured");
        Self {
            inner: Mutex::new(StoreInner {
                pool,
                capacity,
                state: None,
            }),
        }
    }

    /// Select the authoritative replica and repair the rest.
    ///
    /// Idempotent: once a selection is cached, further calls only confirm
    /// the footer still matches it.
    pub fn initialize(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut locked = LockedPool::acquire(&inner.pool)?;
        Self::ensure_fresh(&mut inner, &mut locked)
    }

    /// Fetch the value of `key`.
    pub fn get(&self, key: &str) -> Result<String> {
        self.with_document(|doc| doc.get(key).map(str::to_owned))
    }

    /// The currently-defined keys. Order is unspecified.
    pub fn keys(&self) -> Result<Vec<String>> {
        self.with_document(|doc| Ok(doc.keys()))
    }

    /// All key/value pairs.
    pub fn entries(&self) -> Result<Vec<(String, String)>> {
        self.with_document(Document::entries)
    }

    /// Set `key` to `value` on every replica.
    pub fn set(&self, key: &str, value: &str, options: SetOptions) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut locked = LockedPool::acquire(&inner.pool)?;
        Self::ensure_fresh(&mut inner, &mut locked)?;

        let mut doc = Self::current_document(&inner)?;
        if options.no_create && !doc.contains_key(key) {
            return Err(Error::KeyNotFound(key.to_owned()));
        }
        doc.insert(key, value);
        let bytes = doc.to_bytes()?;
        Self::write_all(&mut inner, &mut locked, bytes, options.zero_fill)
    }

    /// Delete `key` from every replica. Removing an absent key succeeds
    /// without writing anything.
    pub fn remove(&self, key: &str) -> Result<()> {
        let mut inner = self.inner.lock();
        let mut locked = LockedPool::acquire(&inner.pool)?;
        Self::ensure_fresh(&mut inner, &mut locked)?;

        let mut doc = Self::current_document(&inner)?;
        if !doc.remove(key) {
            debug!(key, "remove of absent key is a no-op");
            return Ok(());
        }
        let bytes = doc.to_bytes()?;
        Self::write_all(&mut inner, &mut locked, bytes, false)
    }

    /// Reset every replica to the empty document.
    ///
    /// This is also the bring-up path for blank devices: it needs no
    /// authoritative replica, and afterwards the first pool entry is the
    /// authoritative one.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.pool.is_empty() {
            return Err(Error::NoGoodDevices);
        }
        let mut locked = LockedPool::acquire(&inner.pool)?;

        // Pick up on-device counters so they keep increasing through the
        // clear; uninitialised devices restart from zero.
        for i in 0..inner.pool.len() {
            inner.pool[i].load_footer(locked.file(i))?;
        }

        inner.state = Some(ActiveState {
            authoritative: 0,
            document: Vec::new(),
            digest: String::new(),
            counter: 0,
        });
        inner.pool[0].sha256.clear();
        Self::write_all(&mut inner, &mut locked, b"{}".to_vec(), false)?;
        info!("cleared all replicas");
        Ok(())
    }

    /// Check every non-authoritative replica against the authoritative
    /// contents, repairing mismatches.
    pub fn verify(&self) -> Result<VerifyStatus> {
        let mut inner = self.inner.lock();
        let mut locked = LockedPool::acquire(&inner.pool)?;
        Self::ensure_fresh(&mut inner, &mut locked)?;

        let StoreInner { pool, state, .. } = &mut *inner;
        let Some(state) = state.as_ref() else {
            return Err(Error::NoGoodDevices);
        };

        let mut repaired = 0;
        for i in 0..pool.len() {
            if i == state.authoritative {
                continue;
            }
            let passed = match pool[i].read_document(locked.file(i)) {
                Ok(content) => {
                    sha256_hex(&content) == pool[i].sha256
                        && pool[i].sha256 == state.digest
                        && pool[i].write_counter == Some(state.counter)
                }
                Err(Error::BadMagic { .. }) => false,
                Err(e) => return Err(e),
            };
            if !passed {
                warn!(
                    path = %pool[i].path.display(),
                    "replica failed verification, cloning from authoritative"
                );
                repair::clone_into(
                    &mut pool[i],
                    locked.file(i),
                    &state.document,
                    state.counter,
                    false,
                )?;
                repaired += 1;
            }
        }

        Ok(if repaired == 0 {
            VerifyStatus::AllPassed
        } else {
            VerifyStatus::Repaired
        })
    }

    /// Read-only view of the pool in configuration order.
    pub fn info(&self) -> Vec<DeviceInfo> {
        self.inner.lock().pool.iter().map(Replica::info).collect()
    }

    /// Drop the pool and the cached document.
    ///
    /// Equivalent to dropping the store; provided so shutdown reads as an
    /// operation at call sites.
    pub fn shutdown(self) {
        drop(self);
    }

    // =========================================================================
    // Internals
    // =========================================================================

    /// Run a read-only closure against the freshly-validated document.
    fn with_document<R>(&self, f: impl FnOnce(&Document) -> Result<R>) -> Result<R> {
        let mut inner = self.inner.lock();
        let mut locked = LockedPool::acquire(&inner.pool)?;
        Self::ensure_fresh(&mut inner, &mut locked)?;
        let doc = Self::current_document(&inner)?;
        f(&doc)
    }

    /// Make sure the cached authoritative document reflects the devices.
    ///
    /// With a cache in place this is a single footer read; on a cold store,
    /// after another process wrote, or after a device degraded, it reruns
    /// selection and the repair sweep.
    fn ensure_fresh(inner: &mut StoreInner, locked: &mut LockedPool) -> Result<()> {
        if let Some(state) = &inner.state {
            let auth = state.authoritative;
            let block_size = inner.pool[auth].block_size;
            match footer::read_footer(locked.file(auth), block_size)? {
                FooterState::Valid { digest, counter }
                    if digest == state.digest && counter == state.counter =>
                {
                    return Ok(());
                }
                _ => debug!("cached document is stale, reselecting"),
            }
        }

        let selection = quorum::select_authoritative(&mut inner.pool, locked)?;
        repair::repair_pool(&mut inner.pool, locked, &selection)?;
        Self::install(inner, selection);
        Ok(())
    }

    fn install(inner: &mut StoreInner, selection: Selection) {
        inner.state = Some(ActiveState {
            authoritative: selection.index,
            document: selection.document,
            digest: selection.digest,
            counter: selection.counter,
        });
    }

    fn current_document(inner: &StoreInner) -> Result<Document> {
        match &inner.state {
            Some(state) => Document::parse(&state.document),
            None => Err(Error::NoGoodDevices),
        }
    }

    /// Write `bytes` to the authoritative replica, then clone to the rest.
    ///
    /// The cached state is only advanced once every replica carries the new
    /// (digest, counter) pair; a failure part-way leaves the cache stale on
    /// purpose, so the next operation's freshness check reselects and
    /// repairs.
    fn write_all(
        inner: &mut StoreInner,
        locked: &mut LockedPool,
        bytes: Vec<u8>,
        zero_fill: bool,
    ) -> Result<()> {
        if bytes.len() > inner.capacity {
            return Err(Error::DocumentTooLarge {
                len: bytes.len(),
                capacity: inner.capacity,
            });
        }

        let StoreInner { pool, state, .. } = &mut *inner;
        let Some(state) = state.as_mut() else {
            return Err(Error::NoGoodDevices);
        };

        let auth = state.authoritative;
        if let Some(counter) = pool[auth].write_document(locked.file(auth), &bytes, zero_fill)? {
            let digest = pool[auth].sha256.clone();
            for i in 0..pool.len() {
                if i != auth {
                    repair::clone_into(&mut pool[i], locked.file(i), &bytes, counter, zero_fill)?;
                }
            }
            state.digest = digest;
            state.counter = counter;
        }
        state.document = bytes;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
