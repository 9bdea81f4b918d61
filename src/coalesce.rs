use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedRwLockWriteGuard, RwLock};
use tracing::trace;

/// Per-key fill coordination. The first caller to reach a missing key becomes
/// its filler and holds the key's write half for the duration of the origin
/// call; everyone else becomes a waiter, parked on the read half until the
/// filler finishes. At most one filler exists per key at any time.
pub struct KeyLocks {
    locks: Mutex<HashMap<String, Arc<RwLock<()>>>>,
}

/// What [`KeyLocks::begin`] assigned to the caller.
pub enum KeyLockRole {
    /// Caller owns the fill for this key. Dropping the guard wakes all
    /// waiters, whether or not the fill succeeded.
    Filler(FillerGuard),
    /// Another task is filling; await the lock's read half to learn when it
    /// is done.
    Waiter(Arc<RwLock<()>>),
}

impl KeyLocks {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Claims a role for `key`. The registry mutex is held only for the map
    /// operation; acquiring the write half of a freshly inserted lock cannot
    /// contend, so the vacant arm never blocks.
    pub fn begin(self: &Arc<Self>, key: &str) -> KeyLockRole {
        let mut locks = self.locks.lock();
        match locks.entry(key.to_string()) {
            Entry::Vacant(slot) => {
                let lock = Arc::new(RwLock::new(()));
                match Arc::clone(&lock).try_write_owned() {
                    Ok(write) => {
                        slot.insert(lock);
                        KeyLockRole::Filler(FillerGuard {
                            registry: Arc::clone(self),
                            key: key.to_string(),
                            _write: write,
                        })
                    }
                    // Unreachable for a lock nobody else has seen; degrade to
                    // waiting rather than panic.
                    Err(_) => KeyLockRole::Waiter(lock),
                }
            }
            Entry::Occupied(slot) => {
                trace!(key, "joining in-flight fill");
                KeyLockRole::Waiter(Arc::clone(slot.get()))
            }
        }
    }

    fn finish(&self, key: &str) {
        self.locks.lock().remove(key);
    }
}

impl Default for KeyLocks {
    fn default() -> Self {
        Self::new()
    }
}

/// Held by the filler for the lifetime of its fill. Dropping it first removes
/// the key from the registry, then releases the write half; waiters that wake
/// afterwards re-check storage, and any newcomer finds the registry empty and
/// starts a fresh fill.
pub struct FillerGuard {
    registry: Arc<KeyLocks>,
    key: String,
    _write: OwnedRwLockWriteGuard<()>,
}

impl Drop for FillerGuard {
    fn drop(&mut self) {
        // Deregister before the write guard field drops so no waiter can
        // observe the stale lock after waking.
        self.registry.finish(&self.key);
    }
}
