//! Buckets, the unit of locking and storage.

use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard,
                  RwLockWriteGuard};
use std::borrow::Borrow;
use std::collections::hash_map::{self, HashMap};
use std::hash::{BuildHasher, Hash};

/// A shard of the map.
///
/// The inner table is only ever mutated under the exclusive lock and only ever read under the
/// shared (or exclusive) lock. It starts out absent, and is materialized by the first write
/// targeting the bucket, hashing with a copy of the map's hash provider.
pub struct Bucket<K, V, S> {
    table: RwLock<Option<HashMap<K, V, S>>>,
    /// The hash provider for the table, once it is materialized.
    hash_builder: S,
}

impl<K, V, S> Bucket<K, V, S> {
    pub fn new(hash_builder: S) -> Bucket<K, V, S> {
        Bucket {
            table: RwLock::new(None),
            hash_builder: hash_builder,
        }
    }

    /// Empty the bucket.
    ///
    /// The table is kept (including its allocation), only the entries are dropped.
    pub fn clear(&self) {
        if let Some(table) = self.table.write().as_mut() {
            table.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.table.read().as_ref().map_or(0, HashMap::len)
    }

    /// Retain the entries matching `keep`, returning how many were removed.
    pub fn retain<F>(&self, keep: &mut F) -> usize
    where F: FnMut(&K, &mut V) -> bool {
        match self.table.write().as_mut() {
            Some(table) => {
                let before = table.len();
                table.retain(|key, val| keep(key, val));
                before - table.len()
            },
            None => 0,
        }
    }

    /// Clone the keys currently in the bucket.
    pub fn keys(&self) -> Vec<K>
    where K: Clone {
        self.table.read().as_ref().map_or_else(Vec::new, |table| table.keys().cloned().collect())
    }

    /// Clone the entries currently in the bucket.
    pub fn entries(&self) -> Vec<(K, V)>
    where K: Clone, V: Clone {
        match *self.table.read() {
            Some(ref table) => table.iter().map(|(key, val)| (key.clone(), val.clone())).collect(),
            None => Vec::new(),
        }
    }

    /// Take the table out of the bucket, without locking.
    pub fn into_entries(self) -> Option<hash_map::IntoIter<K, V>> {
        self.table.into_inner().map(IntoIterator::into_iter)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher> Bucket<K, V, S> {
    /// Get the table behind a write lock, creating it if it is absent.
    fn materialize<'a>(&self, table: &'a mut Option<HashMap<K, V, S>>) -> &'a mut HashMap<K, V, S>
    where S: Clone {
        table.get_or_insert_with(|| HashMap::with_hasher(self.hash_builder.clone()))
    }

    pub fn get<Q: ?Sized>(&self, key: &Q) -> Option<V>
    where K: Borrow<Q>, Q: Hash + Eq, V: Clone {
        self.table.read().as_ref().and_then(|table| table.get(key)).cloned()
    }

    pub fn contains<Q: ?Sized>(&self, key: &Q) -> bool
    where K: Borrow<Q>, Q: Hash + Eq {
        self.table.read().as_ref().map_or(false, |table| table.contains_key(key))
    }

    /// Lock the bucket for reading and project the guard onto the value of `key`.
    pub fn read<Q: ?Sized>(&self, key: &Q) -> Option<MappedRwLockReadGuard<V>>
    where K: Borrow<Q>, Q: Hash + Eq {
        RwLockReadGuard::try_map(self.table.read(), |table| {
            table.as_ref().and_then(|table| table.get(key))
        }).ok()
    }

    /// Lock the bucket for writing and project the guard onto the value of `key`.
    pub fn write<Q: ?Sized>(&self, key: &Q) -> Option<MappedRwLockWriteGuard<V>>
    where K: Borrow<Q>, Q: Hash + Eq {
        RwLockWriteGuard::try_map(self.table.write(), |table| {
            table.as_mut().and_then(|table| table.get_mut(key))
        }).ok()
    }

    /// Insert an entry, returning the old value, if any.
    pub fn set(&self, key: K, val: V) -> Option<V>
    where S: Clone {
        let mut lock = self.table.write();
        self.materialize(&mut *lock).insert(key, val)
    }

    pub fn remove<Q: ?Sized>(&self, key: &Q) -> Option<V>
    where K: Borrow<Q>, Q: Hash + Eq {
        self.table.write().as_mut().and_then(|table| table.remove(key))
    }

    /// Get the value of `key`, or insert the one produced by `init`.
    ///
    /// The lock is held exclusively throughout, so `init` runs at most once per call and only
    /// when the key is absent. If `init` fails, nothing is inserted.
    ///
    /// The second element of the returned tuple is `true` if the value was already there.
    pub fn get_or_insert_with<F, E>(&self, key: K, init: F) -> Result<(V, bool), E>
    where F: FnOnce() -> Result<V, E>, V: Clone, S: Clone {
        let mut lock = self.table.write();

        match self.materialize(&mut *lock).entry(key) {
            hash_map::Entry::Occupied(entry) => Ok((entry.get().clone(), true)),
            hash_map::Entry::Vacant(entry) => {
                let val = init()?;
                Ok((entry.insert(val).clone(), false))
            },
        }
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for Bucket<K, V, S> {
    fn clone(&self) -> Bucket<K, V, S> {
        Bucket {
            table: RwLock::new(self.table.read().clone()),
            hash_builder: self.hash_builder.clone(),
        }
    }
}
