//! Settings and presets.

use hash::DEFAULT_BUCKETS;
use slog::Logger;
use std::fmt;

/// Settings for constructing a map.
#[derive(Clone)]
pub struct Settings {
    /// The number of buckets (shards).
    ///
    /// Each bucket has its own lock, so more buckets means less contention, at the cost of a
    /// bigger fixed footprint. `0` is normalized to the default of 31 buckets.
    pub buckets: usize,
    /// The logger to attach to the map.
    ///
    /// If `None`, log records are discarded.
    pub logger: Option<Logger>,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            buckets: DEFAULT_BUCKETS,
            logger: None,
        }
    }
}

impl Settings {
    /// Preset with a given number of buckets.
    pub fn with_buckets(buckets: usize) -> Settings {
        Settings {
            buckets: buckets,
            .. Settings::default()
        }
    }

    /// Preset for a single bucket.
    ///
    /// This behaves like a plain map behind one reader/writer lock. Keys are not hashed for
    /// routing.
    pub fn single() -> Settings {
        Settings::with_buckets(1)
    }

    /// Preset for many threads hammering the map.
    pub fn high_concurrency() -> Settings {
        Settings::with_buckets(257)
    }

    /// Get the effective number of buckets.
    pub fn bucket_count(&self) -> usize {
        if self.buckets == 0 {
            DEFAULT_BUCKETS
        } else {
            self.buckets
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Settings")
            .field("buckets", &self.buckets)
            .field("logger", &self.logger.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default() {
        let settings = Settings::default();
        assert_eq!(settings.buckets, 31);
        assert_eq!(settings.bucket_count(), 31);
        assert!(settings.logger.is_none());
    }

    #[test]
    fn zero_is_normalized() {
        assert_eq!(Settings::with_buckets(0).bucket_count(), DEFAULT_BUCKETS);
    }

    #[test]
    fn compare_presets() {
        assert_eq!(Settings::single().bucket_count(), 1);
        assert!(Settings::high_concurrency().bucket_count() > Settings::default().bucket_count());
        assert_eq!(Settings::with_buckets(7).bucket_count(), 7);
    }

    #[test]
    fn update_syntax() {
        let settings = Settings {
            buckets: 5,
            .. Default::default()
        };
        assert_eq!(settings.bucket_count(), 5);
    }
}
