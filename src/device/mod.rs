//! EEPROM Device Layer
//!
//! One `Replica` describes one physical EEPROM behind a character-device
//! file. The device is a sequence of `block_count` blocks of `block_size`
//! bytes: blocks `0..N-2` carry the document, left-justified and NUL-padded,
//! and block `N-1` is the metadata footer (see [`footer`]).
//!
//! # Components
//!
//! - **Block I/O** (`blockio.rs`): exact-length reads and writes with a
//!   bounded retry budget and an fsync barrier after every write.
//! - **Footer codec** (`footer.rs`): the magic/digest/counter trailer.
//! - **Replica** (this module): whole-document reads and crash-safe
//!   whole-document writes built on the two above.
//!
//! A replica never owns an open handle; callers pass one in for the duration
//! of a single operation and the descriptor only retains what was learned
//! from it (digest, counter).

pub mod blockio;
pub mod footer;

use std::fs::File;
use std::io::{Seek, SeekFrom};
use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use crate::digest::sha256_hex;
use crate::error::{Error, Result};
use footer::{FooterState, MAX_WRITE_COUNTER};

// =============================================================================
// Replica Descriptor
// =============================================================================

/// One EEPROM device holding a full copy of the document plus its footer.
#[derive(Debug)]
pub struct Replica {
    /// Device file path
    pub path: PathBuf,
    /// Driver-imposed write granularity in bytes
    pub block_size: usize,
    /// Usable blocks including the footer block
    pub block_count: usize,
    /// Last-known content digest; empty when unknown, which also forces the
    /// next write through the digest-equal no-op check
    pub sha256: String,
    /// Last-known write counter; `None` until a valid footer has been seen,
    /// so the first write of an uninitialised device lands on counter 0
    pub write_counter: Option<u64>,
}

/// Read-only view of one pool entry, in configuration order.
#[derive(Debug, Clone, Serialize)]
pub struct DeviceInfo {
    /// Device file path
    pub path: PathBuf,
    /// Block size in bytes
    pub block_size: usize,
    /// Total device size in bytes
    pub byte_size: usize,
    /// Number of blocks including the footer block
    pub block_count: usize,
}

impl Replica {
    /// Create a descriptor for a device of `block_count` blocks of
    /// `block_size` bytes.
    pub fn new(path: PathBuf, block_size: usize, block_count: usize) -> Self {
        Self {
            path,
            block_size,
            block_count,
            sha256: String::new(),
            write_counter: None,
        }
    }

    /// Total device size in bytes.
    pub fn byte_size(&self) -> usize {
        self.block_size * self.block_count
    }

    /// Bytes available to the document: every block except the footer block.
    pub fn data_capacity(&self) -> usize {
        self.block_size * (self.block_count - 1)
    }

    /// Snapshot for the info operation.
    pub fn info(&self) -> DeviceInfo {
        DeviceInfo {
            path: self.path.clone(),
            block_size: self.block_size,
            byte_size: self.byte_size(),
            block_count: self.block_count,
        }
    }

    /// Read the device footer and record what it says.
    ///
    /// On `BadMagic` the cached digest and counter are reset so the replica
    /// reads as uninitialised.
    pub fn load_footer(&mut self, file: &mut File) -> Result<FooterState> {
        let state = footer::read_footer(file, self.block_size)?;
        match &state {
            FooterState::Valid { digest, counter } => {
                self.sha256 = digest.clone();
                self.write_counter = Some(*counter);
            }
            FooterState::BadMagic => {
                self.sha256.clear();
                self.write_counter = None;
            }
        }
        Ok(state)
    }

    /// Read the whole document from the device.
    ///
    /// Scans `block_size` chunks for the first NUL byte; bytes after it
    /// within the scanned block are cleared in memory so stale tail content
    /// cannot leak into digest computation. Returns the document bytes up to
    /// (not including) the first NUL; a fully-packed device yields the full
    /// data region. The footer is read afterwards and recorded on the
    /// descriptor; a missing footer is an error here since a document
    /// without metadata cannot be trusted.
    pub fn read_document(&mut self, file: &mut File) -> Result<Vec<u8>> {
        let bs = self.block_size;
        let mut buf = vec![0u8; self.data_capacity()];
        let mut len = self.data_capacity();

        file.seek(SeekFrom::Start(0))?;
        for i in 0..self.block_count - 1 {
            let chunk = &mut buf[i * bs..(i + 1) * bs];
            blockio::read_exact(file, chunk)?;
            if let Some(pos) = chunk.iter().position(|&b| b == 0) {
                for b in &mut chunk[pos..] {
                    *b = 0;
                }
                len = i * bs + pos;
                break;
            }
        }
        buf.truncate(len);

        match self.load_footer(file)? {
            FooterState::Valid { .. } => Ok(buf),
            FooterState::BadMagic => Err(Error::BadMagic {
                path: self.path.clone(),
            }),
        }
    }

    /// Write the whole document to the device.
    ///
    /// The sequence is what makes a mid-write crash recoverable: the footer
    /// block is zeroed first, so a device that loses power during the data
    /// writes is left without a magic tag and is repaired on the next
    /// initialisation instead of being trusted.
    ///
    /// Returns the counter the footer was stamped with, or `None` when the
    /// document digest equals the last-known digest and nothing was written.
    pub fn write_document(
        &mut self,
        file: &mut File,
        doc: &[u8],
        zero_fill: bool,
    ) -> Result<Option<u64>> {
        if doc.len() > self.data_capacity() {
            return Err(Error::DocumentTooLarge {
                len: doc.len(),
                capacity: self.data_capacity(),
            });
        }

        let digest = sha256_hex(doc);
        if digest == self.sha256 {
            debug!(path = %self.path.display(), "digest unchanged, skipping write");
            return Ok(None);
        }
        let counter = self.next_counter()?;

        let bs = self.block_size;
        if zero_fill {
            file.seek(SeekFrom::Start(0))?;
            let zeros = vec![0u8; bs];
            for _ in 0..self.block_count {
                blockio::write_exact(file, &zeros)?;
            }
        } else {
            footer::zero_footer_block(file, bs)?;
        }

        file.seek(SeekFrom::Start(0))?;
        let mut block = vec![0u8; bs];
        for i in 0..self.block_count - 1 {
            let start = i * bs;
            let end = doc.len().min(start + bs);
            let used = end - start;
            block[..used].copy_from_slice(&doc[start..end]);
            for b in &mut block[used..] {
                *b = 0;
            }
            blockio::write_exact(file, &block)?;
            if used < bs {
                // This block holds the terminating NUL
                break;
            }
        }

        footer::write_footer(file, &digest, counter, bs)?;
        debug!(
            path = %self.path.display(),
            counter,
            bytes = doc.len(),
            "document written"
        );
        self.sha256 = digest;
        self.write_counter = Some(counter);
        Ok(Some(counter))
    }

    fn next_counter(&self) -> Result<u64> {
        match self.write_counter {
            None => Ok(0),
            Some(c) if c >= MAX_WRITE_COUNTER => Err(Error::CounterExhausted {
                path: self.path.clone(),
            }),
            Some(c) => Ok(c + 1),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
