//! Concurrent hash maps sharded over reader/writer locked buckets.
//!
//! `BucketMap` is a hash map which can be shared between any number of threads without further
//! locking or coordination.
//!
//! # Design
//!
//! Protecting a whole map with one lock serializes every writer, and makes readers wait for them
//! as well. Instead, the key space is split into a fixed number of independent shards, which we
//! call buckets. Each bucket owns its own reader/writer lock and its own table. A key is routed to
//! its bucket by `hash(key) % buckets`, so two threads only contend when their keys happen to
//! share a bucket.
//!
//! The number of buckets is chosen once, at construction. It defaults to 31, a prime, which
//! spreads keys evenly for the typical hash distribution. With a single bucket, keys are not
//! hashed for routing at all, and the map behaves like a plain `HashMap` behind a `RwLock`.
//!
//! # Locking
//!
//! Every single-key operation takes exactly one bucket lock, in the mode it needs, for its whole
//! duration. Compound operations like `load_or_store()` and `swap()` are thus atomic with respect
//! to each other.
//!
//! No operation ever holds two bucket locks at once, so operations can't deadlock each other. The
//! one pitfall is `load_or_store_with()`: its constructor runs while the bucket is locked, so it
//! must not touch the map (at least not the key's bucket), or it deadlocks.
//!
//! Whole-map operations (`clear()`, `iter()`, `len()`, `retain()`, `snapshot()`) visit the buckets
//! one by one. They are not atomic: a concurrent writer can observe a `clear()` half done.
//!
//! # Iteration
//!
//! `iter()` releases the bucket lock before handing out each entry, so the loop body may freely
//! call back into the map, for example to delete the entry it was just given. This comes at the
//! cost of consistency; see `Iter` for the details. If a per-bucket atomic view is needed, use
//! `snapshot()` instead.
//!
//! # Logging
//!
//! Maps log bucket-wide events through `slog`. By default, the records are discarded. Attach a
//! logger with `BucketMap::with_logger()` or `Settings::logger`.

extern crate parking_lot;
extern crate rand;
extern crate seahash;
#[macro_use]
extern crate slog;

mod bucket;
mod hash;
mod iter;
mod settings;


pub use hash::{SeaBuildHasher, DEFAULT_BUCKETS};
pub use iter::{IntoIter, Iter, Snapshot};
pub use settings::Settings;

use bucket::Bucket;
use hash::Router;
use parking_lot::{MappedRwLockReadGuard, MappedRwLockWriteGuard};
use slog::Logger;
use std::borrow::Borrow;
use std::collections::hash_map::RandomState;
use std::convert::Infallible;
use std::hash::{BuildHasher, Hash};
use std::iter::FromIterator;
use std::{fmt, ops};

/// A read guard to a value in the map.
///
/// This holds the shared lock of the value's bucket. Writers to that bucket block until it is
/// dropped.
pub struct ReadGuard<'a, V: 'a> {
    inner: MappedRwLockReadGuard<'a, V>,
}

impl<'a, V> ops::Deref for ReadGuard<'a, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.inner
    }
}

/// A write guard to a value in the map.
///
/// This holds the exclusive lock of the value's bucket. Anyone else touching that bucket blocks
/// until it is dropped.
pub struct WriteGuard<'a, V: 'a> {
    inner: MappedRwLockWriteGuard<'a, V>,
}

impl<'a, V> ops::Deref for WriteGuard<'a, V> {
    type Target = V;

    fn deref(&self) -> &V {
        &self.inner
    }
}

impl<'a, V> ops::DerefMut for WriteGuard<'a, V> {
    fn deref_mut(&mut self) -> &mut V {
        &mut self.inner
    }
}

/// Create a logger which discards everything.
fn discard() -> Logger {
    Logger::root(slog::Discard, o!())
}

/// A concurrent hash map sharded over a fixed number of buckets.
pub struct BucketMap<K, V, S = RandomState> {
    /// The buckets. The length never changes after construction.
    buckets: Box<[Bucket<K, V, S>]>,
    /// The key-to-bucket router.
    router: Router<S>,
    /// The logger.
    log: Logger,
}

impl<K, V> BucketMap<K, V, RandomState> {
    /// Create a map with the default number of buckets (31).
    pub fn new() -> BucketMap<K, V, RandomState> {
        BucketMap::with_settings(Settings::default())
    }

    /// Create a map with `buckets` buckets.
    ///
    /// If `buckets` is zero, the default number of buckets is used.
    pub fn with_buckets(buckets: usize) -> BucketMap<K, V, RandomState> {
        BucketMap::with_settings(Settings::with_buckets(buckets))
    }

    /// Create a map from some settings.
    pub fn with_settings(settings: Settings) -> BucketMap<K, V, RandomState> {
        BucketMap::with_settings_and_hasher(settings, RandomState::new())
    }
}

impl<K, V, S: Clone> BucketMap<K, V, S> {
    /// Create a map with the default number of buckets, hashing keys with `hasher`.
    ///
    /// The hash provider is used both to route keys to buckets and by the table inside each
    /// bucket.
    pub fn with_hasher(hasher: S) -> BucketMap<K, V, S> {
        BucketMap::with_settings_and_hasher(Settings::default(), hasher)
    }

    /// Create a map with `buckets` buckets, hashing keys with `hasher`.
    ///
    /// If `buckets` is zero, the default number of buckets is used.
    pub fn with_buckets_and_hasher(buckets: usize, hasher: S) -> BucketMap<K, V, S> {
        BucketMap::with_settings_and_hasher(Settings::with_buckets(buckets), hasher)
    }

    /// Create a map from some settings, hashing keys with `hasher`.
    pub fn with_settings_and_hasher(settings: Settings, hasher: S) -> BucketMap<K, V, S> {
        let len = settings.bucket_count();
        let log = settings.logger.unwrap_or_else(discard);

        debug!(log, "creating map"; "buckets" => len, "single" => len == 1);

        // The tables themselves are allocated lazily, on the first write to each bucket.
        let mut buckets = Vec::with_capacity(len);
        for _ in 0..len {
            buckets.push(Bucket::new(hasher.clone()));
        }

        BucketMap {
            buckets: buckets.into_boxed_slice(),
            router: Router::new(len, hasher),
            log: log,
        }
    }
}

impl<K, V, S> BucketMap<K, V, S> {
    /// Attach a logger to the map.
    pub fn with_logger(mut self, log: Logger) -> BucketMap<K, V, S> {
        self.log = log;
        self
    }

    /// Get the number of buckets.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Get the hash provider.
    pub fn hasher(&self) -> &S {
        self.router.hasher()
    }

    /// Count the entries of the map.
    ///
    /// The buckets are counted one at a time, so the result may be off under concurrent writes.
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    /// Is the map empty?
    ///
    /// Like `len()`, this is only accurate in the absence of concurrent writes.
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(|bucket| bucket.len() == 0)
    }

    /// Remove every entry of the map.
    ///
    /// The buckets are cleared one at a time, each under its exclusive lock. Entries inserted into
    /// already-cleared buckets while this runs survive.
    pub fn clear(&self) {
        debug!(self.log, "clearing map"; "buckets" => self.buckets.len());

        for bucket in self.buckets.iter() {
            bucket.clear();
        }
    }

    /// Remove the entries for which `keep` returns `false`.
    ///
    /// The buckets are visited one at a time, and `keep` runs while its bucket is exclusively
    /// locked. Hence, it must not access the map.
    pub fn retain<F>(&self, mut keep: F)
    where F: FnMut(&K, &mut V) -> bool {
        let mut removed = 0;
        for bucket in self.buckets.iter() {
            removed += bucket.retain(&mut keep);
        }

        trace!(self.log, "retained entries"; "removed" => removed);
    }

    /// Iterate over the entries of the map.
    ///
    /// See `Iter` for the consistency guarantees.
    pub fn iter(&self) -> Iter<K, V, S> {
        trace!(self.log, "starting iteration"; "buckets" => self.buckets.len());

        Iter::new(&self.buckets)
    }

    /// Copy the entries of the map, bucket by bucket.
    ///
    /// See `Snapshot` for the consistency guarantees.
    pub fn snapshot(&self) -> Snapshot<K, V>
    where K: Clone, V: Clone {
        trace!(self.log, "taking snapshot"; "buckets" => self.buckets.len());

        Snapshot::new(&self.buckets)
    }
}

impl<K: Hash + Eq, V, S: BuildHasher + Clone> BucketMap<K, V, S> {
    /// Get the bucket owning `key`.
    #[inline]
    fn bucket<Q: ?Sized>(&self, key: &Q) -> &Bucket<K, V, S>
    where K: Borrow<Q>, Q: Hash + Eq {
        &self.buckets[self.router.route(key)]
    }

    /// Get a copy of the value of `key`.
    ///
    /// `None` if the key is absent.
    pub fn load<Q: ?Sized>(&self, key: &Q) -> Option<V>
    where K: Borrow<Q>, Q: Hash + Eq, V: Clone {
        self.bucket(key).get(key)
    }

    /// Does the map contain `key`?
    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> bool
    where K: Borrow<Q>, Q: Hash + Eq {
        self.bucket(key).contains(key)
    }

    /// Get a read guard to the value of `key`.
    ///
    /// The key's bucket stays read-locked while the guard lives. Don't write to the map from the
    /// same thread meanwhile, or it deadlocks.
    pub fn get<Q: ?Sized>(&self, key: &Q) -> Option<ReadGuard<V>>
    where K: Borrow<Q>, Q: Hash + Eq {
        self.bucket(key).read(key).map(|inner| ReadGuard {
            inner: inner,
        })
    }

    /// Get a write guard to the value of `key`.
    ///
    /// The key's bucket stays write-locked while the guard lives. Don't access the map from the
    /// same thread meanwhile, or it deadlocks.
    pub fn get_mut<Q: ?Sized>(&self, key: &Q) -> Option<WriteGuard<V>>
    where K: Borrow<Q>, Q: Hash + Eq {
        self.bucket(key).write(key).map(|inner| WriteGuard {
            inner: inner,
        })
    }

    /// Set the value of `key`, replacing the existing one, if any.
    pub fn store(&self, key: K, val: V) {
        self.bucket(&key).set(key, val);
    }

    /// Remove `key` from the map.
    ///
    /// This is a no-op if the key is absent.
    pub fn delete<Q: ?Sized>(&self, key: &Q)
    where K: Borrow<Q>, Q: Hash + Eq {
        self.bucket(key).remove(key);
    }

    /// Remove `key` from the map, returning its value.
    ///
    /// `None` if the key was absent.
    pub fn load_and_delete<Q: ?Sized>(&self, key: &Q) -> Option<V>
    where K: Borrow<Q>, Q: Hash + Eq {
        self.bucket(key).remove(key)
    }

    /// Get the value of `key`, or store `val` if the key is absent.
    ///
    /// This returns the value now in the map, and whether it was loaded (`true`) or stored
    /// (`false`). An existing value is never overwritten.
    pub fn load_or_store(&self, key: K, val: V) -> (V, bool)
    where V: Clone {
        self.load_or_store_with(key, move || val)
    }

    /// Get the value of `key`, or store the value constructed by `init` if the key is absent.
    ///
    /// `init` is called exactly once if the key is absent, and never if it is present.
    ///
    /// # Deadlocks
    ///
    /// `init` is run while the key's bucket is exclusively locked. If it accesses the map, it might
    /// hit the same bucket and deadlock.
    pub fn load_or_store_with<F>(&self, key: K, init: F) -> (V, bool)
    where F: FnOnce() -> V, V: Clone {
        match self.try_load_or_store_with(key, || Ok::<V, Infallible>(init())) {
            Ok(ret) => ret,
            Err(never) => match never {},
        }
    }

    /// Get the value of `key`, or store the value constructed by the fallible `init`.
    ///
    /// If `init` fails, nothing is stored and the error is passed on. Otherwise, this behaves like
    /// `load_or_store_with()`, deadlock hazard included.
    pub fn try_load_or_store_with<F, E>(&self, key: K, init: F) -> Result<(V, bool), E>
    where F: FnOnce() -> Result<V, E>, V: Clone {
        self.bucket(&key).get_or_insert_with(key, init)
    }

    /// Set the value of `key`, returning the previous value, if any.
    pub fn swap(&self, key: K, val: V) -> Option<V> {
        self.bucket(&key).set(key, val)
    }

    /// Call `f` on every entry until it returns `false`.
    ///
    /// This follows the semantics of `iter()`. In particular, no lock is held while `f` runs, so
    /// it may access the map.
    pub fn range<F>(&self, mut f: F)
    where F: FnMut(&K, &V) -> bool, K: Clone, V: Clone {
        for (key, val) in self.iter() {
            if !f(&key, &val) {
                break;
            }
        }
    }
}

impl<K, V> Default for BucketMap<K, V, RandomState> {
    fn default() -> BucketMap<K, V, RandomState> {
        BucketMap::new()
    }
}

impl<K: Clone, V: Clone, S: Clone> Clone for BucketMap<K, V, S> {
    fn clone(&self) -> BucketMap<K, V, S> {
        BucketMap {
            buckets: self.buckets.clone(),
            router: Router::new(self.buckets.len(), self.router.hasher().clone()),
            log: self.log.clone(),
        }
    }
}

impl<K, V, S> fmt::Debug for BucketMap<K, V, S>
where K: fmt::Debug + Clone, V: fmt::Debug + Clone {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_map().entries(Snapshot::new(&self.buckets)).finish()
    }
}

impl<K, V, S> FromIterator<(K, V)> for BucketMap<K, V, S>
where K: Hash + Eq, S: BuildHasher + Clone + Default {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> BucketMap<K, V, S> {
        let map = BucketMap::with_hasher(S::default());
        for (key, val) in iter {
            map.store(key, val);
        }

        map
    }
}

impl<'a, K, V, S> Extend<(K, V)> for &'a BucketMap<K, V, S>
where K: Hash + Eq, S: BuildHasher + Clone {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, val) in iter {
            self.store(key, val);
        }
    }
}

impl<K, V, S> IntoIterator for BucketMap<K, V, S> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V, S>;

    fn into_iter(self) -> IntoIter<K, V, S> {
        IntoIter::new(self.buckets.into_vec())
    }
}

impl<'a, K, V, S> IntoIterator for &'a BucketMap<K, V, S>
where K: Hash + Eq + Clone, V: Clone, S: BuildHasher {
    type Item = (K, V);
    type IntoIter = Iter<'a, K, V, S>;

    fn into_iter(self) -> Iter<'a, K, V, S> {
        self.iter()
    }
}
