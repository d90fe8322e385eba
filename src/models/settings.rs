use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_PREVIEW_LIMIT: i64 = 10;
pub const MAX_PREVIEW_LIMIT: i64 = 100_000;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct QuerySettings {
    /// Seconds a cached result stays valid.
    pub cache_ttl_secs: u64,
    pub default_limit: i64,
}

impl Default for QuerySettings {
    fn default() -> Self {
        QuerySettings {
            cache_ttl_secs: 60,
            default_limit: 1000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PoolSettings {
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolSettings {
    fn default() -> Self {
        PoolSettings {
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Settings {
    pub query: QuerySettings,
    pub pool: PoolSettings,
}

impl Settings {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.query.cache_ttl_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.pool.acquire_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_dashboard_behaviour() {
        let settings = Settings::default();
        assert_eq!(settings.cache_ttl(), Duration::from_secs(60));
        assert_eq!(settings.query.default_limit, 1000);
        assert_eq!(settings.pool.max_connections, 5);
        assert!((MIN_PREVIEW_LIMIT..=MAX_PREVIEW_LIMIT).contains(&settings.query.default_limit));
    }
}
