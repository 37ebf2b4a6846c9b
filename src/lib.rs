//! eepman - Self-Healing Replicated EEPROM Storage
//!
//! Reliable persistence for a small set of string-keyed configuration
//! values on a pool of raw EEPROM devices. Every device holds a complete
//! replica of the same compact JSON document plus a trailing metadata
//! footer (magic tag, SHA-256 digest, monotonic write counter).
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          EepromStore                            │
//! │         get / set / remove / keys / clear / verify / info       │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │ Lock Manager │──▶│    Quorum    │──▶│    Repair    │         │
//! │  │   (flock)    │   │   Selector   │   │    Sweep     │         │
//! │  └──────────────┘   └──────────────┘   └──────────────┘         │
//! │            │                 │                 │                │
//! │            └─────────────────┼─────────────────┘                │
//! │                              ▼                                  │
//! │          Replica I/O  ──  Footer Codec  ──  Block I/O           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A write zeroes the footer block before touching the data blocks, so a
//! crash mid-write leaves the device without its magic tag; the next
//! initialisation selects a surviving replica by digest-verified highest
//! write counter and clones it back over the torn one.
//!
//! # Modules
//!
//! - [`config`] - Replica pool configuration file
//! - [`device`] - Replica descriptors, block I/O, footer codec
//! - [`digest`] - SHA-256 content digests
//! - [`document`] - The flat string-to-string JSON document
//! - [`error`] - Error types
//! - [`store`] - The replicated store facade
//!
//! # Example
//!
//! ```rust,no_run
//! use eepman::{EepromStore, SetOptions};
//!
//! # fn main() -> eepman::Result<()> {
//! let store = EepromStore::open(std::path::Path::new("/etc/eeprom-manager.conf"))?;
//! store.set("serial", "A1B2", SetOptions::default())?;
//! assert_eq!(store.get("serial")?, "A1B2");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod device;
pub mod digest;
pub mod document;
pub mod error;
pub mod store;

// Re-export commonly used types
pub use config::{Config, ReplicaSpec, DEFAULT_CONFIG_PATH};
pub use device::DeviceInfo;
pub use error::{Error, Result};
pub use store::{EepromStore, SetOptions, VerifyStatus};
