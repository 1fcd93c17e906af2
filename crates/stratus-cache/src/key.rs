//! Composite cache keys.

use std::fmt;

/// Separator between cache name and key in the storage string.
pub const KEY_SEPARATOR: &str = "::";

/// A logical cache name plus the request parameters.
///
/// Both tiers store the entry under the same storage string,
/// `"{cache_name}::{key}"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    cache_name: String,
    key: String,
}

impl CacheKey {
    /// Creates a key within a cache name.
    #[must_use]
    pub fn new(cache_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            cache_name: cache_name.into(),
            key: key.into(),
        }
    }

    /// Returns the logical cache name.
    #[must_use]
    pub fn cache_name(&self) -> &str {
        &self.cache_name
    }

    /// Returns the parameter part of the key.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the full storage string.
    #[must_use]
    pub fn storage_key(&self) -> String {
        format!("{}{}{}", self.cache_name, KEY_SEPARATOR, self.key)
    }

    /// Parses a storage string back into a key.
    #[must_use]
    pub fn from_storage(storage_key: &str) -> Option<Self> {
        storage_key
            .split_once(KEY_SEPARATOR)
            .map(|(cache_name, key)| Self::new(cache_name, key))
    }

    /// Pattern matching every storage string of a cache name.
    #[must_use]
    pub fn name_pattern(cache_name: &str) -> String {
        format!("{}{}*", cache_name, KEY_SEPARATOR)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.cache_name, KEY_SEPARATOR, self.key)
    }
}
