//! Read-through cache of user records keyed by ID.
//!
//! The cache never holds the source of truth. Entries are written only after
//! a store read and are deleted, not refreshed, on every update or delete.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::config::CacheConfig;
use crate::error::{CacheError, CacheResult};
use crate::models::User;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserCache: Send + Sync {
    async fn set(&self, user: &User) -> CacheResult<()>;

    /// `CacheError::Miss` when the key is absent or expired.
    async fn get_by_id(&self, id: Uuid) -> CacheResult<User>;

    /// Deleting an absent key succeeds.
    async fn delete(&self, id: Uuid) -> CacheResult<()>;
}

/// Redis-backed user cache.
#[derive(Clone)]
pub struct RedisUserCache {
    redis: ConnectionManager,
    config: CacheConfig,
}

impl RedisUserCache {
    pub fn new(redis: ConnectionManager, config: CacheConfig) -> Self {
        Self { redis, config }
    }
}

#[async_trait]
impl UserCache for RedisUserCache {
    async fn set(&self, user: &User) -> CacheResult<()> {
        let json = serde_json::to_string(user)?;
        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(self.config.key(user.id), json, self.config.ttl_seconds)
            .await?;
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> CacheResult<User> {
        let mut conn = self.redis.clone();
        let json: Option<String> = conn.get(self.config.key(id)).await?;
        match json {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => {
                debug!(user_id = %id, "user cache miss");
                Err(CacheError::Miss)
            }
        }
    }

    async fn delete(&self, id: Uuid) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(self.config.key(id)).await?;
        Ok(())
    }
}

/// JSON values with a per-entry deadline. Expired entries read as absent and
/// are dropped on the next read of that key or the next write to the map.
#[derive(Clone, Default)]
pub(crate) struct ExpiringMap {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl ExpiringMap {
    pub(crate) async fn put<T: Serialize>(&self, key: String, value: &T, ttl: Duration) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.retain(|_, (_, deadline)| *deadline > now);
        entries.insert(key, (json, now + ttl));
        Ok(())
    }

    pub(crate) async fn fetch<T: DeserializeOwned>(&self, key: &str) -> CacheResult<T> {
        let mut entries = self.entries.write().await;
        match entries.get(key) {
            None => return Err(CacheError::Miss),
            Some((json, deadline)) if *deadline > Instant::now() => {
                return Ok(serde_json::from_str(json)?);
            }
            Some(_) => {}
        }
        entries.remove(key);
        Err(CacheError::Miss)
    }

    pub(crate) async fn remove(&self, key: &str) {
        self.entries.write().await.remove(key);
    }
}

/// Process-local user cache honouring the configured TTL.
#[derive(Clone, Default)]
pub struct InMemoryUserCache {
    entries: ExpiringMap,
    config: CacheConfig,
}

impl InMemoryUserCache {
    pub fn new(config: CacheConfig) -> Self {
        Self {
            entries: ExpiringMap::default(),
            config,
        }
    }
}

#[async_trait]
impl UserCache for InMemoryUserCache {
    async fn set(&self, user: &User) -> CacheResult<()> {
        self.entries
            .put(self.config.key(user.id), user, self.config.ttl())
            .await
    }

    async fn get_by_id(&self, id: Uuid) -> CacheResult<User> {
        self.entries.fetch(&self.config.key(id)).await
    }

    async fn delete(&self, id: Uuid) -> CacheResult<()> {
        self.entries.remove(&self.config.key(id)).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            username: "ann".into(),
            email: Some("ann@x.com".into()),
            password_hash: Some("secret-hash".into()),
            role: Some("user".into()),
            avatar: None,
            created_at: now,
            updated_at: now,
            login_date: now,
        }
    }

    #[tokio::test]
    async fn set_then_get_strips_hash() {
        let cache = InMemoryUserCache::new(CacheConfig::default());
        let user = user();
        cache.set(&user).await.unwrap();

        let cached = cache.get_by_id(user.id).await.unwrap();
        assert_eq!(cached.username, "ann");
        assert!(cached.password_hash.is_none());
    }

    #[tokio::test]
    async fn unknown_id_is_a_miss() {
        let cache = InMemoryUserCache::new(CacheConfig::default());
        assert!(matches!(cache.get_by_id(Uuid::new_v4()).await, Err(CacheError::Miss)));
    }

    #[tokio::test]
    async fn delete_is_idempotent() {
        let cache = InMemoryUserCache::new(CacheConfig::default());
        let user = user();
        cache.set(&user).await.unwrap();

        cache.delete(user.id).await.unwrap();
        cache.delete(user.id).await.unwrap();
        assert!(matches!(cache.get_by_id(user.id).await, Err(CacheError::Miss)));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire_after_ttl() {
        let cache = InMemoryUserCache::new(CacheConfig {
            prefix: "test".into(),
            ttl_seconds: 5,
        });
        let user = user();
        cache.set(&user).await.unwrap();

        tokio::time::advance(Duration::from_secs(4)).await;
        assert!(cache.get_by_id(user.id).await.is_ok());

        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(matches!(cache.get_by_id(user.id).await, Err(CacheError::Miss)));
    }

    #[tokio::test(start_paused = true)]
    async fn writes_sweep_expired_entries() {
        let map = ExpiringMap::default();
        map.put("stale".into(), &1u8, Duration::from_secs(5)).await.unwrap();
        map.put("fresh".into(), &2u8, Duration::from_secs(60)).await.unwrap();

        tokio::time::advance(Duration::from_secs(10)).await;
        map.put("new".into(), &3u8, Duration::from_secs(5)).await.unwrap();

        let entries = map.entries.read().await;
        assert_eq!(entries.len(), 2);
        assert!(!entries.contains_key("stale"));
        assert!(entries.contains_key("fresh"));
    }
}
