use ahash::AHashMap;
use parking_lot::RwLock;

use crate::key::DerivedKey;

/// Result of a [`MemoTable::get_or_compute`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Hit,
    /// The value was computed; `replaced` reports whether a concurrent caller
    /// had already stored the key by the time we wrote it.
    Miss { replaced: bool },
}

/// Grow-only map from derived key to stored result.
///
/// One table-wide reader/writer lock guards the map. The lock is held for a
/// single probe or a single insertion, never while a value is being computed,
/// so concurrent misses on one key may each compute and the last write wins.
pub struct MemoTable<R> {
    entries: RwLock<AHashMap<u64, R>>,
}

impl<R> MemoTable<R> {
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(AHashMap::with_capacity(capacity)),
        }
    }

    pub fn get(&self, key: DerivedKey) -> Option<R>
    where
        R: Clone,
    {
        self.entries.read().get(&key.0).cloned()
    }

    /// Stores `value` under `key`, returning whether an entry was replaced.
    pub fn insert(&self, key: DerivedKey, value: R) -> bool {
        // The displaced value is dropped after the guard is released.
        let previous = self.entries.write().insert(key.0, value);
        previous.is_some()
    }

    pub fn contains(&self, key: DerivedKey) -> bool {
        self.entries.read().contains_key(&key.0)
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    pub fn get_or_compute(&self, key: DerivedKey, compute: impl FnOnce() -> R) -> (R, Lookup)
    where
        R: Clone,
    {
        if let Some(value) = self.get(key) {
            return (value, Lookup::Hit);
        }
        let value = compute();
        let replaced = self.insert(key, value.clone());
        (value, Lookup::Miss { replaced })
    }

    /// Like [`get_or_compute`](Self::get_or_compute), but an `Err` from
    /// `compute` is returned without touching the table.
    pub fn try_get_or_compute<E>(
        &self,
        key: DerivedKey,
        compute: impl FnOnce() -> Result<R, E>,
    ) -> Result<(R, Lookup), E>
    where
        R: Clone,
    {
        if let Some(value) = self.get(key) {
            return Ok((value, Lookup::Hit));
        }
        let value = compute()?;
        let replaced = self.insert(key, value.clone());
        Ok((value, Lookup::Miss { replaced }))
    }
}

impl<R> Default for MemoTable<R> {
    fn default() -> Self {
        Self::new()
    }
}
