//! Haulboard Storage - Backend Trait, Mock Backend and Cache
//!
//! Defines the abstraction the data layer uses to reach the hosted database,
//! an in-memory implementation of it, and the in-process read-through cache.
//! The HTTP implementation lives in haulboard-data.

pub mod backend;
pub mod cache;
pub mod mock;

pub use backend::{DataBackend, Embed, Filter, Join, Order, Query, SortDirection};
pub use cache::{CacheRead, CacheStats, FillTicket, ReadThroughCache, TtlCache};
pub use mock::{MockBackend, RpcHandler};
