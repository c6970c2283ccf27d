//! Iterators over the entries of a map.

use bucket::Bucket;
use rand::seq::SliceRandom;
use std::collections::hash_map;
use std::hash::{BuildHasher, Hash};
use std::vec;

/// A weakly consistent iterator over the entries of a map.
///
/// This is created by `BucketMap::iter()`. The buckets are visited in a random order, drawn when
/// the iterator is created. On entering a bucket, its keys are collected under the shared lock.
/// Every key is then looked up again just before being yielded, and the lock is released before
/// the entry is handed out.
///
/// No lock is held between calls to `next()`, so the consumer is free to call back into the map,
/// even for the key it was just handed. The flip side is that the pass is no snapshot: keys
/// removed before they are reached are skipped, and keys inserted into an already-entered bucket
/// are not seen.
pub struct Iter<'a, K: 'a, V: 'a, S: 'a> {
    /// The buckets of the map.
    buckets: &'a [Bucket<K, V, S>],
    /// The indices of the buckets yet to visit.
    order: vec::IntoIter<usize>,
    /// The bucket currently visited.
    current: Option<&'a Bucket<K, V, S>>,
    /// The keys of the current bucket which are yet to be yielded.
    keys: vec::IntoIter<K>,
}

impl<'a, K, V, S> Iter<'a, K, V, S> {
    pub(crate) fn new(buckets: &'a [Bucket<K, V, S>]) -> Iter<'a, K, V, S> {
        let mut order: Vec<usize> = (0..buckets.len()).collect();
        // Every pass draws its own bucket order.
        order.shuffle(&mut rand::rng());

        Iter {
            buckets: buckets,
            order: order.into_iter(),
            current: None,
            keys: Vec::new().into_iter(),
        }
    }
}

impl<'a, K: Hash + Eq + Clone, V: Clone, S: BuildHasher> Iterator for Iter<'a, K, V, S> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some(bucket) = self.current {
                for key in &mut self.keys {
                    // The key might have been removed since we entered the bucket.
                    if let Some(val) = bucket.get(&key) {
                        return Some((key, val));
                    }
                }
            }

            // The bucket is exhausted; move on to the next one.
            let bucket = &self.buckets[self.order.next()?];
            self.keys = bucket.keys().into_iter();
            self.current = Some(bucket);
        }
    }
}

/// An iterator over a bucket-by-bucket copy of a map.
///
/// This is created by `BucketMap::snapshot()`. Every bucket is copied atomically under its
/// shared lock, so no entry is torn or seen twice. The buckets are still copied one at a time,
/// so writes racing with the snapshot may be reflected for some buckets and not for others.
pub struct Snapshot<K, V> {
    entries: vec::IntoIter<(K, V)>,
}

impl<K: Clone, V: Clone> Snapshot<K, V> {
    pub(crate) fn new<S>(buckets: &[Bucket<K, V, S>]) -> Snapshot<K, V> {
        let mut entries = Vec::new();
        for bucket in buckets {
            entries.extend(bucket.entries());
        }

        Snapshot {
            entries: entries.into_iter(),
        }
    }
}

impl<K, V> Snapshot<K, V> {
    /// The number of entries in the snapshot not yet yielded.
    pub fn remaining(&self) -> usize {
        self.entries.len()
    }
}

impl<K, V> Iterator for Snapshot<K, V> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        self.entries.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Snapshot<K, V> {}

/// An owning iterator over the entries of a map.
///
/// The map is consumed, so nothing is locked.
pub struct IntoIter<K, V, S> {
    buckets: vec::IntoIter<Bucket<K, V, S>>,
    current: Option<hash_map::IntoIter<K, V>>,
}

impl<K, V, S> IntoIter<K, V, S> {
    pub(crate) fn new(buckets: Vec<Bucket<K, V, S>>) -> IntoIter<K, V, S> {
        IntoIter {
            buckets: buckets.into_iter(),
            current: None,
        }
    }
}

impl<K, V, S> Iterator for IntoIter<K, V, S> {
    type Item = (K, V);

    fn next(&mut self) -> Option<(K, V)> {
        loop {
            if let Some(entry) = self.current.as_mut().and_then(|entries| entries.next()) {
                return Some(entry);
            }

            self.current = self.buckets.next()?.into_entries();
        }
    }
}
