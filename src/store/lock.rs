//! Lock Manager
//!
//! Every store operation holds an exclusive whole-file advisory lock on
//! every replica for its full duration, acquired in pool order. Processes
//! sharing a pool therefore serialise at operation granularity, provided
//! they configure the replicas in the same order; overlapping pools
//! configured in different orders can deadlock, which is an accepted
//! limitation of advisory ordering.
//!
//! Acquisition may block indefinitely. Signals restart both the open and
//! the lock. If any step fails, locks already taken are released and their
//! handles closed before the error is returned.

use std::fs::{File, OpenOptions};
use std::io::ErrorKind;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use nix::errno::Errno;
use nix::fcntl::{Flock, FlockArg};
use tracing::{debug, warn};

use crate::device::Replica;
use crate::error::{Error, Result};

/// RAII guard over the open, locked replica handles.
///
/// Handles are opened read-write with close-on-exec and locked in pool
/// order. Dropping the guard releases the locks and closes the handles in
/// forward order. A partially-acquired guard never escapes `acquire`.
pub struct LockedPool {
    devices: Vec<Flock<File>>,
}

impl LockedPool {
    /// Open and lock every replica, in pool order.
    pub fn acquire(pool: &[Replica]) -> Result<Self> {
        let mut devices = Vec::with_capacity(pool.len());
        for replica in pool {
            let file = open_device(&replica.path)?;
            let guard = lock_exclusive(file, &replica.path)?;
            debug!(path = %replica.path.display(), "acquired exclusive lock");
            devices.push(guard);
            // On error the partial `devices` vector drops here, releasing
            // the locks taken so far in forward order.
        }
        Ok(Self { devices })
    }

    /// Number of locked devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// The open handle for pool entry `index`, valid while the guard lives.
    pub fn file(&mut self, index: usize) -> &mut File {
        &mut self.devices[index]
    }
}

fn open_device(path: &Path) -> Result<File> {
    loop {
        match OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_CLOEXEC)
            .open(path)
        {
            Ok(file) => return Ok(file),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot open EEPROM device");
                return Err(e.into());
            }
        }
    }
}

fn lock_exclusive(file: File, path: &Path) -> Result<Flock<File>> {
    let mut file = file;
    loop {
        match Flock::lock(file, FlockArg::LockExclusive) {
            Ok(guard) => return Ok(guard),
            Err((returned, Errno::EINTR)) => file = returned,
            Err((_, errno)) => {
                warn!(path = %path.display(), error = %errno, "cannot lock EEPROM device");
                return Err(Error::Io(std::io::Error::from(errno)));
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
