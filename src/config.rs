//! Configuration Reader
//!
//! The replica pool comes from a plain text file, one device per
//! non-comment line:
//!
//! ```text
//! # path          block_size  total_bytes
//! /dev/eeprom0    256         4096
//! /dev/eeprom1    256         4096
//! ```
//!
//! Lines whose first non-whitespace byte is `#` are comments. Malformed
//! lines, devices whose block size cannot hold the metadata footer, and
//! devices too small for a data block plus the footer block are skipped
//! with a warning. Pool order is file order and is observable through the
//! info operation, so it must be the same in every process sharing the
//! devices.

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::device::footer::FOOTER_LEN;
use crate::device::Replica;
use crate::error::{Error, Result};

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/eeprom-manager.conf";

/// Longest accepted device path in bytes
pub const MAX_PATH_LEN: usize = 100;

/// One parsed configuration line.
#[derive(Debug, Clone)]
pub struct ReplicaSpec {
    /// Device file path
    pub path: PathBuf,
    /// Block size in bytes
    pub block_size: usize,
    /// Total device size in bytes
    pub byte_size: usize,
}

impl ReplicaSpec {
    /// Usable blocks, including the footer block.
    pub fn block_count(&self) -> usize {
        self.byte_size / self.block_size
    }
}

/// The ordered replica set.
#[derive(Debug, Clone)]
pub struct Config {
    /// Replica descriptions in file order
    pub replicas: Vec<ReplicaSpec>,
}

impl Config {
    /// Load and parse the configuration file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::parse(&text)
    }

    /// Parse configuration text. Fails only when no usable replica remains.
    pub fn parse(text: &str) -> Result<Self> {
        let mut replicas = Vec::new();
        let mut first_geometry: Option<(usize, usize)> = None;

        for (index, raw) in text.lines().enumerate() {
            let line = raw.trim();
            let lineno = index + 1;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 3 {
                warn!(lineno, "skipping malformed configuration line");
                continue;
            }

            let path = fields[0];
            let (block_size, byte_size) = match (fields[1].parse(), fields[2].parse()) {
                (Ok(bs), Ok(size)) => (bs, size),
                _ => {
                    warn!(lineno, "skipping line with non-numeric sizes");
                    continue;
                }
            };

            if path.len() > MAX_PATH_LEN {
                warn!(lineno, "skipping device with over-long path");
                continue;
            }
            if block_size < FOOTER_LEN {
                warn!(
                    lineno,
                    block_size,
                    "block size cannot hold the {FOOTER_LEN}-byte metadata footer, skipping"
                );
                continue;
            }

            let spec = ReplicaSpec {
                path: PathBuf::from(path),
                block_size,
                byte_size,
            };
            if spec.block_count() < 2 {
                warn!(
                    lineno,
                    byte_size, "device too small for a data block plus the footer block, skipping"
                );
                continue;
            }

            let geometry = (spec.block_size, spec.block_count());
            match first_geometry {
                None => first_geometry = Some(geometry),
                Some(first) if first != geometry => {
                    warn!(
                        path = %spec.path.display(),
                        "device geometry differs from the rest of the pool, \
                         capacity is limited by the smallest device"
                    );
                }
                Some(_) => {}
            }

            replicas.push(spec);
        }

        if replicas.is_empty() {
            return Err(Error::Config("no usable replicas in configuration".into()));
        }
        Ok(Self { replicas })
    }

    /// Largest serialised document the pool can hold: the smallest replica's
    /// document region.
    pub fn capacity(&self) -> usize {
        self.replicas
            .iter()
            .map(|r| r.block_size * (r.block_count() - 1))
            .min()
            .unwrap_or(0)
    }

    /// Build the replica descriptors in configuration order.
    pub fn build_pool(&self) -> Vec<Replica> {
        self.replicas
            .iter()
            .map(|spec| Replica::new(spec.path.clone(), spec.block_size, spec.block_count()))
            .collect()
    }
}

// =============================================================================
// Tests
// =============================================================================
