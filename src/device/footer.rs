//! Footer Codec
//!
//! The last block of every device carries a fixed-layout metadata footer:
//!
//! ```text
//! offset 0..5    : "eepman"                      (6 bytes, ASCII)
//! offset 6..69   : lowercase hex SHA-256         (64 bytes)
//! offset 70..79  : zero-padded decimal counter   (10 bytes)
//! offset 80..B-1 : unspecified (zeroed by the writer)
//! ```
//!
//! A device whose footer does not open with the magic tag is uninitialised;
//! the reader reports that without touching the rest of the block. Torn
//! metadata whose counter field is not all digits is classified the same
//! way, so it can never contribute a counter to replica selection.

use std::fs::File;
use std::io::{Seek, SeekFrom};

use crate::device::blockio;
use crate::digest::DIGEST_HEX_LEN;
use crate::error::Result;

/// Magic tag opening every valid footer
pub const MAGIC: &[u8] = b"eepman";

/// Width of the zero-padded decimal write counter
pub const COUNTER_DIGITS: usize = 10;

/// Bytes of the footer block actually carrying metadata
pub const FOOTER_LEN: usize = MAGIC.len() + DIGEST_HEX_LEN + COUNTER_DIGITS;

/// Largest value the decimal counter field can represent
pub const MAX_WRITE_COUNTER: u64 = 9_999_999_999;

/// Outcome of reading a device footer.
///
/// I/O failures are reported through `Result`; `BadMagic` is not an error,
/// it is the normal state of a device that has never been written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FooterState {
    /// Footer parsed: stored content digest and write counter
    Valid { digest: String, counter: u64 },
    /// No magic tag (or torn metadata): device is uninitialised
    BadMagic,
}

/// Read the footer from the last block of the device.
pub fn read_footer(file: &mut File, block_size: usize) -> Result<FooterState> {
    file.seek(SeekFrom::End(-(block_size as i64)))?;

    let mut magic = [0u8; MAGIC.len()];
    blockio::read_exact(file, &mut magic)?;
    if magic != MAGIC {
        return Ok(FooterState::BadMagic);
    }

    let mut digest = [0u8; DIGEST_HEX_LEN];
    blockio::read_exact(file, &mut digest)?;
    let mut counter = [0u8; COUNTER_DIGITS];
    blockio::read_exact(file, &mut counter)?;

    let digest = match std::str::from_utf8(&digest) {
        Ok(s) => s.to_owned(),
        Err(_) => return Ok(FooterState::BadMagic),
    };
    match parse_counter(&counter) {
        Some(counter) => Ok(FooterState::Valid { digest, counter }),
        None => Ok(FooterState::BadMagic),
    }
}

/// Write magic, digest and counter consecutively into the footer block.
///
/// The caller must have zeroed the footer block first; this writes only the
/// leading `FOOTER_LEN` bytes.
pub fn write_footer(file: &mut File, digest: &str, counter: u64, block_size: usize) -> Result<()> {
    debug_assert_eq!(digest.len(), DIGEST_HEX_LEN);

    file.seek(SeekFrom::End(-(block_size as i64)))?;
    let mut buf = Vec::with_capacity(FOOTER_LEN);
    buf.extend_from_slice(MAGIC);
    buf.extend_from_slice(digest.as_bytes());
    buf.extend_from_slice(format!("{:0width$}", counter, width = COUNTER_DIGITS).as_bytes());
    blockio::write_exact(file, &buf)
}

/// Overwrite the entire footer block with zero bytes.
pub fn zero_footer_block(file: &mut File, block_size: usize) -> Result<()> {
    file.seek(SeekFrom::End(-(block_size as i64)))?;
    blockio::write_exact(file, &vec![0u8; block_size])
}

fn parse_counter(bytes: &[u8]) -> Option<u64> {
    let s = std::str::from_utf8(bytes).ok()?;
    if s.len() != COUNTER_DIGITS || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}

// =============================================================================
// Tests
// =============================================================================
