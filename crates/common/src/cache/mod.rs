//! Redis-backed read cache
//!
//! Listing pages and the tag-facet rollup are the only queries hot and
//! stable enough to be worth caching; both are stored as JSON strings
//! under a short TTL. The cache is strictly optional: the gateway runs
//! without it, and callers treat an outage exactly like a miss.

use crate::errors::Result;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use serde::{de::DeserializeOwned, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

/// Redis cache client, namespaced under a key prefix
pub struct Cache {
    connection: RwLock<MultiplexedConnection>,
    prefix: String,
}

impl Cache {
    /// Connect to Redis. Fails fast so the caller can decide to run
    /// without a cache rather than limp along with a broken one.
    pub async fn connect(url: &str, prefix: &str) -> Result<Self> {
        let client = Client::open(url)?;
        let connection = client.get_multiplexed_async_connection().await?;

        Ok(Self {
            connection: RwLock::new(connection),
            prefix: prefix.to_string(),
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.prefix, key)
    }

    /// Fetch and decode a cached value, `None` on miss
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let key = self.namespaced(key);
        let mut conn = self.connection.write().await;

        let raw: Option<String> = conn.get(&key).await?;
        drop(conn);

        match raw {
            Some(json) => {
                debug!(key = %key, "Cache hit");
                Ok(Some(serde_json::from_str(&json)?))
            }
            None => {
                debug!(key = %key, "Cache miss");
                Ok(None)
            }
        }
    }

    /// Store a value under a TTL
    pub async fn set_with_ttl<T: Serialize>(&self, key: &str, value: &T, ttl_secs: u64) -> Result<()> {
        let key = self.namespaced(key);
        let json = serde_json::to_string(value)?;

        let mut conn = self.connection.write().await;
        conn.set_ex::<_, _, ()>(&key, &json, ttl_secs).await?;

        debug!(key = %key, ttl_secs, "Cache set");
        Ok(())
    }

    /// Drop a key, e.g. when a write invalidates a cached rollup
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let key = self.namespaced(key);
        let mut conn = self.connection.write().await;

        let removed: i32 = conn.del(&key).await?;
        Ok(removed > 0)
    }

    /// Round-trip PING for the readiness probe
    pub async fn ping(&self) -> Result<()> {
        let mut conn = self.connection.write().await;
        redis::cmd("PING").query_async::<String>(&mut *conn).await?;
        Ok(())
    }
}

/// Cache key builders, one per cached query shape
pub mod keys {
    /// A manga listing page, keyed by the normalized query hash
    pub fn manga_list(query_hash: &str) -> String {
        format!("manga_list:{}", query_hash)
    }

    /// The genre/tag facet rollup
    pub fn tag_facets() -> String {
        "tag_facets".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_builders() {
        assert_eq!(keys::manga_list("abc123"), "manga_list:abc123");
        assert_eq!(keys::tag_facets(), "tag_facets");
    }
}
