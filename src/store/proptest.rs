//! Property-Based Tests for the Replicated Store
//!
//! Uses proptest to exercise the store against randomly generated
//! operation sequences on temp-file device pools.
//!
//! # Test Properties
//!
//! 1. **Round-trip**: a get after a set returns the set value until it is
//!    overwritten or removed
//! 2. **Replication**: after any successful write every replica carries the
//!    same (digest, counter) pair and the digest matches the content
//! 3. **Monotonic counter**: counters strictly increase across writes
//! 4. **No-op stability**: a digest-equal set does not advance the counter
//! 5. **Idempotent initialisation**
//! 6. **Capacity enforcement**: an oversized document is refused and the
//!    devices keep their previous state

#![cfg(test)]

use std::collections::HashMap;
use std::io::Write;

use proptest::prelude::*;

use crate::config::{Config, ReplicaSpec};
use crate::device::footer::{read_footer, FooterState};
use crate::digest::sha256_hex;
use crate::error::Error;
use crate::store::{EepromStore, SetOptions};

const BS: usize = 128;
const BLOCKS: usize = 8;

// =============================================================================
// Fixtures and Strategies
// =============================================================================

/// One random store operation.
#[derive(Debug, Clone)]
enum Op {
    Set(String, String),
    Remove(String),
    Clear,
}

fn key_strategy() -> impl Strategy<Value = String> {
    "[a-d]{1,4}"
}

fn value_strategy() -> impl Strategy<Value = String> {
    "[ -~]{0,24}"
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (key_strategy(), value_strategy()).prop_map(|(k, v)| Op::Set(k, v)),
        2 => key_strategy().prop_map(Op::Remove),
        1 => Just(Op::Clear),
    ]
}

fn temp_pool(devices: usize) -> (tempfile::TempDir, EepromStore) {
    let dir = tempfile::tempdir().unwrap();
    let replicas = (0..devices)
        .map(|i| {
            let path = dir.path().join(format!("eeprom{i}"));
            let mut file = std::fs::File::create(&path).unwrap();
            file.write_all(&vec![0u8; BS * BLOCKS]).unwrap();
            ReplicaSpec {
                path,
                block_size: BS,
                byte_size: BS * BLOCKS,
            }
        })
        .collect();
    (dir, EepromStore::from_config(Config { replicas }))
}

/// Read (digest, counter) straight off a device file.
fn raw_footer(path: &std::path::Path) -> (String, u64) {
    let mut file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .unwrap();
    match read_footer(&mut file, BS).unwrap() {
        FooterState::Valid { digest, counter } => (digest, counter),
        FooterState::BadMagic => panic!("device {} has no footer", path.display()),
    }
}

// =============================================================================
// Round-trip and Replication Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    /// Property: the store agrees with an in-memory map after any sequence
    /// of set/remove/clear operations.
    #[test]
    fn prop_store_matches_model(ops in prop::collection::vec(op_strategy(), 1..12)) {
        let (_dir, store) = temp_pool(2);
        store.clear().unwrap();

        let mut model: HashMap<String, String> = HashMap::new();
        for op in ops {
            match op {
                Op::Set(key, value) => {
                    store.set(&key, &value, SetOptions::default()).unwrap();
                    model.insert(key, value);
                }
                Op::Remove(key) => {
                    store.remove(&key).unwrap();
                    model.remove(&key);
                }
                Op::Clear => {
                    store.clear().unwrap();
                    model.clear();
                }
            }
        }

        for (key, value) in &model {
            prop_assert_eq!(&store.get(key).unwrap(), value);
        }
        let mut keys = store.keys().unwrap();
        keys.sort();
        let mut expected: Vec<String> = model.keys().cloned().collect();
        expected.sort();
        prop_assert_eq!(keys, expected);
    }

    /// Property: after a successful write every replica carries identical
    /// (digest, counter) and the digest covers the stored content.
    #[test]
    fn prop_replicas_agree_after_writes(
        values in prop::collection::vec(value_strategy(), 1..6),
    ) {
        let (dir, store) = temp_pool(3);
        store.clear().unwrap();

        for value in &values {
            store.set("k", value, SetOptions::default()).unwrap();
        }

        let footers: Vec<(String, u64)> = (0..3)
            .map(|i| raw_footer(&dir.path().join(format!("eeprom{i}"))))
            .collect();
        for footer in &footers[1..] {
            prop_assert_eq!(footer, &footers[0]);
        }

        let expected = format!(
            "{{\"k\":{}}}",
            serde_json::Value::String(values.last().unwrap().clone())
        );
        prop_assert_eq!(&footers[0].0, &sha256_hex(expected.as_bytes()));
    }
}

// =============================================================================
// Counter Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Property: counters strictly increase, one step per distinct write.
    #[test]
    fn prop_counter_monotonic(writes in 1usize..6) {
        let (dir, store) = temp_pool(2);
        store.clear().unwrap();
        let device = dir.path().join("eeprom0");
        let (_, after_clear) = raw_footer(&device);
        prop_assert_eq!(after_clear, 0);

        let mut previous = after_clear;
        for i in 0..writes {
            store.set("n", &i.to_string(), SetOptions::default()).unwrap();
            let (_, counter) = raw_footer(&device);
            prop_assert_eq!(counter, previous + 1);
            previous = counter;
        }
    }

    /// Property: setting the same value twice advances the counter exactly
    /// once across the two calls.
    #[test]
    fn prop_noop_set_is_stable(value in value_strategy()) {
        let (dir, store) = temp_pool(2);
        store.clear().unwrap();

        store.set("k", &value, SetOptions::default()).unwrap();
        let first = raw_footer(&dir.path().join("eeprom0"));
        store.set("k", &value, SetOptions::default()).unwrap();
        let second = raw_footer(&dir.path().join("eeprom0"));

        prop_assert_eq!(first, second);
    }
}

// =============================================================================
// Initialisation and Capacity Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    /// Property: initialising twice looks exactly like initialising once.
    #[test]
    fn prop_initialize_idempotent(value in value_strategy()) {
        let (dir, store) = temp_pool(2);
        store.clear().unwrap();
        store.set("k", &value, SetOptions::default()).unwrap();

        store.initialize().unwrap();
        let first = raw_footer(&dir.path().join("eeprom0"));
        store.initialize().unwrap();
        let second = raw_footer(&dir.path().join("eeprom0"));

        prop_assert_eq!(first, second);
        prop_assert_eq!(&store.get("k").unwrap(), &value);
    }

    /// Property: a document over pool capacity is refused and the previous
    /// contents survive untouched.
    #[test]
    fn prop_capacity_enforced(excess in 1usize..64) {
        let (dir, store) = temp_pool(2);
        store.clear().unwrap();
        store.set("k", "small", SetOptions::default()).unwrap();
        let before = raw_footer(&dir.path().join("eeprom0"));

        // {"k":"..."} wraps the value in 8 framing bytes
        let capacity = BS * (BLOCKS - 1);
        let oversized = "x".repeat(capacity - 8 + excess);
        let err = store.set("k", &oversized, SetOptions::default()).unwrap_err();
        let is_too_large = matches!(err, Error::DocumentTooLarge { .. });
        prop_assert!(is_too_large);

        let after = raw_footer(&dir.path().join("eeprom0"));
        prop_assert_eq!(before, after);
        prop_assert_eq!(&store.get("k").unwrap(), "small");
    }
}
