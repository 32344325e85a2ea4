//! Cache Eviction Policy
//!
//! Budget and age limits for the edge geometry cache.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{DEFAULT_MAX_ENTRY_AGE, DEFAULT_MEMORY_BUDGET};

/// Cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Combined byte budget for both tiers
    pub memory_budget_bytes: usize,
    /// Entries not accessed for this long are stale
    #[serde(with = "duration_secs")]
    pub max_entry_age: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            memory_budget_bytes: DEFAULT_MEMORY_BUDGET,
            max_entry_age: DEFAULT_MAX_ENTRY_AGE,
        }
    }
}

impl CacheConfig {
    /// Configuration with a custom budget and default age limit
    pub fn with_budget(memory_budget_bytes: usize) -> Self {
        Self {
            memory_budget_bytes,
            ..Default::default()
        }
    }

    /// Check if an entry of this age is stale under `max_age`
    #[inline]
    pub fn is_stale(age: Duration, max_age: Duration) -> bool {
        age > max_age
    }

    /// Check if a single entry could ever fit in the budget
    #[inline]
    pub fn fits(&self, size: usize) -> bool {
        size <= self.memory_budget_bytes
    }
}

/// Serde helper: `Duration` as whole seconds
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// Serde helper: `Duration` as whole milliseconds
pub(crate) mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}
