//! Per-cache-name tier policies.

use std::collections::HashMap;
use std::time::Duration;
use stratus_core::{StratusError, StratusResult};

/// TTLs and bounds for one cache name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TierPolicy {
    /// Tier-1 time to live.
    pub tier1_ttl: Duration,
    /// Tier-1 maximum entry count, evicting least recently used beyond it.
    pub tier1_max_entries: usize,
    /// Tier-2 time to live.
    pub tier2_ttl: Duration,
}

/// The single table of cache names consulted by both tiers.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    policies: HashMap<String, TierPolicy>,
}

impl PolicyTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces the policy for a cache name.
    #[must_use]
    pub fn with_policy(mut self, cache_name: impl Into<String>, policy: TierPolicy) -> Self {
        self.policies.insert(cache_name.into(), policy);
        self
    }

    /// Returns the policy for a cache name, rejecting unknown names.
    pub fn get(&self, cache_name: &str) -> StratusResult<&TierPolicy> {
        self.policies
            .get(cache_name)
            .ok_or_else(|| StratusError::cache(format!("Unknown cache name '{}'", cache_name)))
    }

    /// Returns true if the cache name is known.
    #[must_use]
    pub fn contains(&self, cache_name: &str) -> bool {
        self.policies.contains_key(cache_name)
    }

    /// Returns all cache names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.policies.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Iterates over all policies.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TierPolicy)> {
        self.policies.iter().map(|(name, policy)| (name.as_str(), policy))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> TierPolicy {
        TierPolicy {
            tier1_ttl: Duration::from_secs(1800),
            tier1_max_entries: 10_000,
            tier2_ttl: Duration::from_secs(300),
        }
    }

    #[test]
    fn test_lookup_known_and_unknown() {
        let table = PolicyTable::new().with_policy("currentTemp", policy());
        assert_eq!(table.get("currentTemp").unwrap().tier2_ttl, Duration::from_secs(300));
        assert!(table.contains("currentTemp"));

        let err = table.get("dailyForecast").unwrap_err();
        assert!(matches!(err, StratusError::Cache(_)));
    }

    #[test]
    fn test_names_sorted() {
        let table = PolicyTable::new()
            .with_policy("hourlyForecast", policy())
            .with_policy("currentTemp", policy())
            .with_policy("fiveDaysForecast", policy());
        assert_eq!(table.names(), vec!["currentTemp", "fiveDaysForecast", "hourlyForecast"]);
    }
}
