//! # Stratus Cache
//!
//! Two-level cache: a bounded in-process Tier-1 ([`MemoryTier`]) in front of a
//! shared Redis Tier-2 ([`RedisTier`]), composed by [`TwoLevelCache`].

pub mod key;
pub mod memory_tier;
pub mod policy;
pub mod redis_tier;
pub mod stats;
pub mod tier;
pub mod two_level;

pub use key::CacheKey;
pub use memory_tier::{CacheEntry, MemoryTier};
pub use policy::{PolicyTable, TierPolicy};
pub use redis_tier::{create_pool, RedisTier, DEFAULT_OP_TIMEOUT};
pub use stats::{register_metrics, TierStats, TierStatsSnapshot};
pub use tier::CacheTier;
pub use two_level::TwoLevelCache;
