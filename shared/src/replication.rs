//! Versioned field synchronization.
//!
//! The authority wraps each replicated value in [`Replicated`], which bumps a
//! monotonically increasing version on every write. Receivers keep a
//! [`FieldMirror`] and apply an update only if its version is newer than the
//! last one they accepted for that field (last-value-wins). Duplicates and
//! stale reorderings are dropped.

use crate::protocol::FieldKey;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Replicated<T> {
    value: T,
    version: u64,
}

impl<T> Replicated<T> {
    pub fn new(value: T) -> Self {
        Self { value, version: 0 }
    }

    pub fn get(&self) -> &T {
        &self.value
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    /// Stores a new value and returns its version.
    pub fn set(&mut self, value: T) -> u64 {
        self.value = value;
        self.version += 1;
        self.version
    }

    /// Mutates in place, bumping the version.
    pub fn modify<R>(&mut self, f: impl FnOnce(&mut T) -> R) -> (R, u64) {
        let result = f(&mut self.value);
        self.version += 1;
        (result, self.version)
    }
}

/// Receiver-side record of the newest version seen per field.
#[derive(Debug, Default)]
pub struct FieldMirror {
    versions: HashMap<FieldKey, u64>,
}

impl FieldMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true and records `version` if it is newer than anything seen
    /// for `key`.
    pub fn accept(&mut self, key: FieldKey, version: u64) -> bool {
        match self.versions.get(&key) {
            Some(&seen) if seen >= version => false,
            _ => {
                self.versions.insert(key, version);
                true
            }
        }
    }

    pub fn version(&self, key: FieldKey) -> Option<u64> {
        self.versions.get(&key).copied()
    }

    pub fn forget(&mut self, key: FieldKey) {
        self.versions.remove(&key);
    }
}
