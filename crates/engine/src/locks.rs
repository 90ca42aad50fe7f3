// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-fingerprint execution locks.
//!
//! At most one pipeline runs for a given (WorkDir, fingerprint). Entries
//! are held weakly so the map only contains fingerprints someone holds or
//! waits for.

use ax_core::Fingerprint;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use tokio::sync::OwnedMutexGuard;

type Key = (String, Fingerprint);

#[derive(Default)]
pub struct FingerprintLocks {
    locks: Mutex<HashMap<Key, Weak<tokio::sync::Mutex<()>>>>,
}

impl FingerprintLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for the lock of `fingerprint` in `workdir`.
    pub async fn lock(&self, workdir: &str, fingerprint: &Fingerprint) -> OwnedMutexGuard<()> {
        let mutex = {
            let mut locks = self.locks.lock();
            locks.retain(|_, weak| weak.strong_count() > 0);
            let key = (workdir.to_string(), fingerprint.clone());
            match locks.get(&key).and_then(Weak::upgrade) {
                Some(mutex) => mutex,
                None => {
                    let mutex = Arc::new(tokio::sync::Mutex::new(()));
                    locks.insert(key, Arc::downgrade(&mutex));
                    mutex
                }
            }
        };
        mutex.lock_owned().await
    }

    /// Number of fingerprints currently locked or waited on.
    pub fn active(&self) -> usize {
        self.locks.lock().values().filter(|weak| weak.strong_count() > 0).count()
    }
}

#[cfg(test)]
#[path = "locks_tests.rs"]
mod tests;
