//! Staleness metadata carried by cache reads.

use std::time::Duration;

/// Result of a read-through, carrying where the value came from and how old
/// it was when served.
#[derive(Debug, Clone)]
pub struct CacheRead<T> {
    /// The cached value.
    value: T,
    /// Age of the value at read time. Zero for fresh fetches.
    age: Duration,
    /// Whether this was a cache hit or miss.
    was_cache_hit: bool,
}

impl<T> CacheRead<T> {
    /// Create a new cache read from a cache hit.
    pub fn from_cache(value: T, age: Duration) -> Self {
        Self {
            value,
            age,
            was_cache_hit: true,
        }
    }

    /// Create a new cache read from a backend fetch (cache miss).
    pub fn from_fetch(value: T) -> Self {
        Self {
            value,
            age: Duration::ZERO,
            was_cache_hit: false,
        }
    }

    /// Consume the wrapper and return the underlying value.
    pub fn into_value(self) -> T {
        self.value
    }

    /// Get a reference to the underlying value.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// How old the value was when it was served.
    pub fn age(&self) -> Duration {
        self.age
    }

    /// Check if this was a cache hit.
    pub fn was_cache_hit(&self) -> bool {
        self.was_cache_hit
    }

    /// Check if this was a cache miss (fetched from the backend).
    pub fn was_cache_miss(&self) -> bool {
        !self.was_cache_hit
    }

    /// Map the inner value to a new type.
    pub fn map<U, F>(self, f: F) -> CacheRead<U>
    where
        F: FnOnce(T) -> U,
    {
        CacheRead {
            value: f(self.value),
            age: self.age,
            was_cache_hit: self.was_cache_hit,
        }
    }
}

impl<T> AsRef<T> for CacheRead<T> {
    fn as_ref(&self) -> &T {
        &self.value
    }
}
