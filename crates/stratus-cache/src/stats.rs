//! Cache counters.
//!
//! Every event increments both an in-process atomic, readable through
//! [`TierStats::snapshot`], and a `metrics` counter for whatever recorder the
//! binary installs.

use metrics::{counter, describe_counter};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Metric names for the cache layer.
pub mod names {
    /// Lookups served by a tier.
    pub const CACHE_HITS_TOTAL: &str = "stratus_cache_hits_total";
    /// Lookups missing both tiers.
    pub const CACHE_MISSES_TOTAL: &str = "stratus_cache_misses_total";
    /// Tier-2 values copied into Tier-1.
    pub const CACHE_PROMOTIONS_TOTAL: &str = "stratus_cache_promotions_total";
    /// Tier-2 operations that failed or timed out.
    pub const TIER2_FAILURES_TOTAL: &str = "stratus_cache_tier2_failures_total";
    /// Stored payloads that could not be decoded.
    pub const DECODE_FAILURES_TOTAL: &str = "stratus_cache_decode_failures_total";
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!(names::CACHE_HITS_TOTAL, "Total number of cache hits by tier");
    describe_counter!(
        names::CACHE_MISSES_TOTAL,
        "Total number of lookups that missed both tiers"
    );
    describe_counter!(
        names::CACHE_PROMOTIONS_TOTAL,
        "Total number of Tier-2 values promoted into Tier-1"
    );
    describe_counter!(
        names::TIER2_FAILURES_TOTAL,
        "Total number of failed Tier-2 operations"
    );
    describe_counter!(
        names::DECODE_FAILURES_TOTAL,
        "Total number of cached payloads that failed to decode"
    );
}

/// Atomic cache counters.
#[derive(Debug, Default)]
pub struct TierStats {
    tier1_hits: AtomicU64,
    tier2_hits: AtomicU64,
    misses: AtomicU64,
    promotions: AtomicU64,
    tier2_read_failures: AtomicU64,
    tier2_write_failures: AtomicU64,
    decode_failures: AtomicU64,
}

/// Point-in-time copy of [`TierStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TierStatsSnapshot {
    pub tier1_hits: u64,
    pub tier2_hits: u64,
    pub misses: u64,
    pub promotions: u64,
    pub tier2_read_failures: u64,
    pub tier2_write_failures: u64,
    pub decode_failures: u64,
}

impl TierStats {
    pub(crate) fn tier1_hit(&self, cache_name: &str) {
        self.tier1_hits.fetch_add(1, Ordering::Relaxed);
        counter!(
            names::CACHE_HITS_TOTAL,
            "cache" => cache_name.to_string(),
            "tier" => "tier1"
        )
        .increment(1);
    }

    pub(crate) fn tier2_hit(&self, cache_name: &str) {
        self.tier2_hits.fetch_add(1, Ordering::Relaxed);
        counter!(
            names::CACHE_HITS_TOTAL,
            "cache" => cache_name.to_string(),
            "tier" => "tier2"
        )
        .increment(1);
    }

    pub(crate) fn miss(&self, cache_name: &str) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_MISSES_TOTAL, "cache" => cache_name.to_string()).increment(1);
    }

    pub(crate) fn promotion(&self, cache_name: &str) {
        self.promotions.fetch_add(1, Ordering::Relaxed);
        counter!(names::CACHE_PROMOTIONS_TOTAL, "cache" => cache_name.to_string()).increment(1);
    }

    pub(crate) fn tier2_read_failure(&self, operation: &'static str) {
        self.tier2_read_failures.fetch_add(1, Ordering::Relaxed);
        counter!(names::TIER2_FAILURES_TOTAL, "operation" => operation).increment(1);
    }

    pub(crate) fn tier2_write_failure(&self, operation: &'static str) {
        self.tier2_write_failures.fetch_add(1, Ordering::Relaxed);
        counter!(names::TIER2_FAILURES_TOTAL, "operation" => operation).increment(1);
    }

    pub(crate) fn decode_failure(&self, cache_name: &str) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
        counter!(names::DECODE_FAILURES_TOTAL, "cache" => cache_name.to_string()).increment(1);
    }

    /// Returns the current counter values.
    pub fn snapshot(&self) -> TierStatsSnapshot {
        TierStatsSnapshot {
            tier1_hits: self.tier1_hits.load(Ordering::Relaxed),
            tier2_hits: self.tier2_hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            promotions: self.promotions.load(Ordering::Relaxed),
            tier2_read_failures: self.tier2_read_failures.load(Ordering::Relaxed),
            tier2_write_failures: self.tier2_write_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
        }
    }
}
