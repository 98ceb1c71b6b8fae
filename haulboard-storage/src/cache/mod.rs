//! In-process read-through cache.
//!
//! Staleness is decided by the reader: every lookup passes the maximum age it
//! accepts, and reads through [`ReadThroughCache::get_or_fetch`] return a
//! [`CacheRead<T>`] carrying where the value came from and how old it is.
//!
//! # Example
//!
//! ```ignore
//! let cache: TtlCache<Vec<Operator>> = TtlCache::new();
//! cache.set("operators:list", operators).await;
//! let hit = cache.get("operators:list", Duration::from_millis(60_000)).await;
//! cache.invalidate("operators:list").await;
//! ```

pub mod freshness;
pub mod read_through;

pub use freshness::CacheRead;
pub use read_through::{CacheStats, FillTicket, ReadThroughCache};

/// Name used by callers that only need the get/set/invalidate contract.
pub type TtlCache<V> = ReadThroughCache<V>;
