//! Cache configuration.

use std::time::Duration;

/// Size and expiry settings for one cache.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub max_capacity: u64,

    /// Entries expire this long after insertion.
    pub ttl: Option<Duration>,

    /// Entries expire when untouched for this long.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
            tti: None,
        }
    }
}

impl CacheConfig {
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            max_capacity,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn ttl(mut self, duration: Duration) -> Self {
        self.ttl = Some(duration);
        self
    }

    /// Group metadata and admin lookups.
    ///
    /// Short-lived: admin changes must show up quickly even when the
    /// service sends no group update.
    pub fn group_metadata() -> Self {
        Self {
            max_capacity: 5_000,
            ttl: Some(Duration::from_secs(60)),
            tti: None,
        }
    }

    /// Conversational state waiting on the user's next message.
    pub fn pending_input() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(600)),
            tti: Some(Duration::from_secs(300)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_overrides_defaults() {
        let config = CacheConfig::with_capacity(10).ttl(Duration::from_secs(5));
        assert_eq!(config.max_capacity, 10);
        assert_eq!(config.ttl, Some(Duration::from_secs(5)));
        assert_eq!(config.tti, None);
    }
}
