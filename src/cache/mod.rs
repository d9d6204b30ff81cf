//! Cache Module
//!
//! Three-tier content cache with TTL expiration, size-bounded eviction and
//! targeted invalidation.

mod entry;
pub mod invalidation;
pub mod keys;
pub mod persistent;
mod stats;
mod store;
pub mod tier;
pub mod tiered;


// Re-export public types
pub use entry::{current_timestamp_ms, fingerprint, CacheEntry};
pub use invalidation::{InvalidationReport, InvalidationRouter};
pub use keys::{CacheKey, Operation, OperationKind, ParamValue, Params};
pub use persistent::{FileKvStore, KeyValueStore, MemoryKvStore, PersistentTier};
pub use stats::CacheStats;
pub use store::CacheStore;
pub use tier::{CacheTier, MemoryTier, TierLevel};
pub use tiered::{Resolved, ResolvedFrom, TierStats, TieredCache};
