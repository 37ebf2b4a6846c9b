//! Exact-length transfers on an open device handle
//!
//! EEPROM character devices routinely return short reads and writes, so both
//! directions loop until the full span has moved or a bounded retry budget
//! runs out. Interruption by a signal restarts the syscall without consuming
//! the budget. Every completed write is followed by an fsync barrier.
//!
//! Offset positioning is the caller's responsibility.

use std::fs::File;
use std::io::{ErrorKind, Read, Write};

use tracing::warn;

use crate::error::{Error, Result};

/// Retry budget for short transfers
pub const MAX_RW_ATTEMPTS: u32 = 100;

/// Read exactly `buf.len()` bytes from the current offset.
pub fn read_exact(file: &mut File, buf: &mut [u8]) -> Result<()> {
    let mut done = 0;
    let mut attempts = 0;
    while done < buf.len() {
        if attempts >= MAX_RW_ATTEMPTS {
            warn!(
                wanted = buf.len(),
                got = done,
                "read still short after {MAX_RW_ATTEMPTS} attempts"
            );
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::UnexpectedEof,
                format!("short read: {done} of {} bytes", buf.len()),
            )));
        }
        match file.read(&mut buf[done..]) {
            Ok(n) => {
                done += n;
                attempts += 1;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

/// Write exactly `buf.len()` bytes at the current offset, then flush the
/// device so the bytes are durable before the caller moves on.
pub fn write_exact(file: &mut File, buf: &[u8]) -> Result<()> {
    let mut done = 0;
    let mut attempts = 0;
    while done < buf.len() {
        if attempts >= MAX_RW_ATTEMPTS {
            warn!(
                wanted = buf.len(),
                got = done,
                "write still short after {MAX_RW_ATTEMPTS} attempts"
            );
            return Err(Error::Io(std::io::Error::new(
                ErrorKind::WriteZero,
                format!("short write: {done} of {} bytes", buf.len()),
            )));
        }
        match file.write(&buf[done..]) {
            Ok(n) => {
                done += n;
                attempts += 1;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }
    file.sync_all()?;
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
