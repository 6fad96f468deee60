//! Redis client with JSON values and namespaced keys.

use std::future::Future;
use std::time::Duration;

use redis::{AsyncCommands, Client, aio::ConnectionManager};
use serde::{Serialize, de::DeserializeOwned};
use tracing::{debug, error, instrument, warn};

use crate::config::CacheConfig;

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Cheap to clone; clones share one multiplexed connection.
#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
    default_ttl: Duration,
    prefix: String,
}

impl std::fmt::Debug for RedisCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisCache")
            .field("prefix", &self.prefix)
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}

impl RedisCache {
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let client = Client::open(config.redis_url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Self {
            conn,
            default_ttl: config.default_ttl(),
            prefix: config.key_prefix.clone(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// `None` on a miss, and also on Redis or decode failures.
    #[instrument(skip(self), fields(cache.operation = "GET"))]
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let mut conn = self.conn.clone();
        let full_key = self.full_key(key);

        match conn.get::<_, Option<String>>(&full_key).await {
            Ok(Some(raw)) => match serde_json::from_str(&raw) {
                Ok(value) => {
                    debug!(cache.key = %full_key, "Cache hit");
                    Some(value)
                }
                Err(e) => {
                    warn!(cache.key = %full_key, error = %e, "Discarding undecodable cache entry");
                    None
                }
            },
            Ok(None) => {
                debug!(cache.key = %full_key, "Cache miss");
                None
            }
            Err(e) => {
                error!(cache.key = %full_key, error = %e, "Redis GET failed");
                None
            }
        }
    }

    #[instrument(skip(self, value), fields(cache.operation = "SET"))]
    pub async fn set<T: Serialize>(&self, key: &str, value: &T) -> Result<(), CacheError> {
        self.set_with_ttl(key, value, self.default_ttl).await
    }

    #[instrument(skip(self, value), fields(cache.operation = "SETEX"))]
    pub async fn set_with_ttl<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        let json = serde_json::to_string(value)?;
        let full_key = self.full_key(key);

        conn.set_ex::<_, _, ()>(&full_key, json, ttl.as_secs().max(1))
            .await?;
        debug!(cache.key = %full_key, cache.ttl_secs = ttl.as_secs(), "Cache set");

        Ok(())
    }

    #[instrument(skip(self), fields(cache.operation = "DEL"))]
    pub async fn invalidate(&self, key: &str) -> Result<(), CacheError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(self.full_key(key)).await?;
        Ok(())
    }

    /// Deletes every key under `prefix`, walking the keyspace with SCAN so
    /// Redis is never blocked by a single KEYS call.
    #[instrument(skip(self), fields(cache.operation = "SCAN_DEL"))]
    pub async fn invalidate_pattern(&self, prefix: &str) -> Result<u64, CacheError> {
        let mut conn = self.conn.clone();
        let pattern = format!("{}*", self.full_key(prefix));
        let mut cursor: u64 = 0;
        let mut deleted: u64 = 0;

        loop {
            let (next, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(200)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                deleted += conn.del::<_, u64>(&keys).await?;
            }

            cursor = next;
            if cursor == 0 {
                break;
            }
        }

        debug!(cache.pattern = %pattern, cache.deleted = deleted, "Prefix invalidated");
        Ok(deleted)
    }

    #[instrument(skip(self), fields(cache.operation = "EXISTS"))]
    pub async fn exists(&self, key: &str) -> bool {
        let mut conn = self.conn.clone();
        conn.exists::<_, bool>(self.full_key(key))
            .await
            .unwrap_or_else(|e| {
                error!(cache.key = %key, error = %e, "Redis EXISTS failed");
                false
            })
    }
}

/// Read-through helper: returns the cached value for `key`, or runs `load`,
/// stores its result, and returns it. Errors from `load` are passed through
/// untouched; write failures are only logged.
pub async fn cached<T, E, F, Fut>(cache: Option<&RedisCache>, key: &str, load: F) -> Result<T, E>
where
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let Some(cache) = cache else {
        return load().await;
    };

    if let Some(hit) = cache.get::<T>(key).await {
        return Ok(hit);
    }

    let value = load().await?;
    if let Err(e) = cache.set(key, &value).await {
        warn!(cache.key = %key, error = %e, "Failed to populate cache");
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        id: i32,
        name: String,
    }

    #[tokio::test]
    async fn test_cached_without_cache_calls_loader() {
        let value: Result<Sample, ()> = cached(None, "unused", || async {
            Ok(Sample {
                id: 7,
                name: "seven".into(),
            })
        })
        .await;
        assert_eq!(value.unwrap().id, 7);
    }

    #[tokio::test]
    async fn test_cached_passes_loader_errors_through() {
        let value: Result<Sample, &str> = cached(None, "unused", || async { Err("boom") }).await;
        assert_eq!(value.unwrap_err(), "boom");
    }

    #[tokio::test]
    #[ignore = "requires Redis"]
    async fn test_round_trip_and_prefix_invalidation() {
        let config = CacheConfig {
            key_prefix: "schoolhub-test".into(),
            ..CacheConfig::default()
        };
        let cache = RedisCache::connect(&config).await.unwrap();

        let data = Sample {
            id: 1,
            name: "one".into(),
        };
        cache.set("course:1", &data).await.unwrap();
        cache.set("course:2", &data).await.unwrap();
        assert_eq!(cache.get::<Sample>("course:1").await, Some(data));

        let deleted = cache.invalidate_pattern("course:").await.unwrap();
        assert_eq!(deleted, 2);
        assert!(!cache.exists("course:2").await);
    }
}
