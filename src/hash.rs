//! Routing of keys to buckets.

use seahash::SeaHasher;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};

/// The bucket count used when none (or zero) is given.
///
/// A prime, so keys spread evenly over the buckets for typical hash distributions.
pub const DEFAULT_BUCKETS: usize = 31;

/// A deterministic hash provider based on SeaHash.
///
/// Unlike `RandomState`, this yields the same routing across runs, which is handy for
/// reproducible tests and benchmarks.
pub type SeaBuildHasher = BuildHasherDefault<SeaHasher>;

/// The key-to-bucket router.
///
/// Both fields are immutable after construction, so routing requires no lock.
pub struct Router<S> {
    /// The number of buckets. Never zero.
    buckets: usize,
    /// The hash provider.
    hash_builder: S,
}

impl<S> Router<S> {
    pub fn new(buckets: usize, hash_builder: S) -> Router<S> {
        debug_assert!(buckets > 0, "a map needs at least one bucket");

        Router {
            buckets: buckets,
            hash_builder: hash_builder,
        }
    }

    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }
}

impl<S: BuildHasher> Router<S> {
    /// Get the index of the bucket owning `key`.
    ///
    /// With a single bucket, every key lives in bucket 0 and the key is never hashed.
    #[inline]
    pub fn route<Q: Hash + ?Sized>(&self, key: &Q) -> usize {
        if self.buckets == 1 {
            return 0;
        }

        (self.hash_builder.hash_one(key) % self.buckets as u64) as usize
    }
}
