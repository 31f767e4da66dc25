use bytes::Bytes;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// The Store holds the string table and the hash table shared by every connection. Each table
/// sits behind its own reader/writer lock, so operations on one never block operations on the
/// other. The locks are never exposed: every operation takes the lock it needs for the duration
/// of the map access only. The store is cheap to clone, clones share the same tables.
#[derive(Clone, Default)]
pub struct Store {
    inner: Arc<InnerStore>,
}

#[derive(Default)]
struct InnerStore {
    strings: RwLock<HashMap<Key, Bytes>>,
    hashes: RwLock<HashMap<Key, Hash>>,
}

type Key = String;
type Field = String;
type Hash = HashMap<Field, Bytes>;

impl Store {
    pub fn new() -> Store {
        Self::default()
    }

    /// Sets `key` to `value`, replacing any previous value.
    pub fn set(&self, key: Key, value: Bytes) {
        write(&self.inner.strings).insert(key, value);
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        read(&self.inner.strings).get(key).cloned()
    }

    /// Sets `field` in the hash stored at `key`, creating the hash if it does not exist yet.
    pub fn hset(&self, key: Key, field: Field, value: Bytes) {
        // Lookup, creation and insertion happen under one write guard so concurrent writers to
        // the same hash can't lose each other's fields.
        let mut hashes = write(&self.inner.hashes);
        hashes.entry(key).or_default().insert(field, value);
    }

    pub fn hget(&self, key: &str, field: &str) -> Option<Bytes> {
        read(&self.inner.hashes)
            .get(key)
            .and_then(|hash| hash.get(field))
            .cloned()
    }

    /// Returns every field/value pair of the hash stored at `key`, in no particular order.
    pub fn hgetall(&self, key: &str) -> Option<Vec<(Field, Bytes)>> {
        read(&self.inner.hashes).get(key).map(|hash| {
            hash.iter()
                .map(|(field, value)| (field.clone(), value.clone()))
                .collect()
        })
    }
}

// A writer panicking mid-operation can't leave a table half updated, every operation is a
// single map call, so a poisoned lock still guards consistent data.
fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
