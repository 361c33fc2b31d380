//! Short-lived login sessions keyed by an opaque random ID.

use async_trait::async_trait;
use redis::{aio::ConnectionManager, AsyncCommands};
use uuid::Uuid;

use crate::cache::ExpiringMap;
use crate::config::SessionConfig;
use crate::error::{CacheError, CacheResult};
use crate::models::Session;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Stores a fresh session for `user_id` and returns its ID for the cookie.
    async fn create(&self, user_id: Uuid) -> CacheResult<String>;

    async fn get_by_id(&self, id: &str) -> CacheResult<Session>;

    /// Idempotent: deleting an unknown session succeeds.
    async fn delete_by_id(&self, id: &str) -> CacheResult<()>;
}

/// Redis-backed session store; expiry is delegated to the key TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    redis: ConnectionManager,
    config: SessionConfig,
}

impl RedisSessionStore {
    pub fn new(redis: ConnectionManager, config: SessionConfig) -> Self {
        Self { redis, config }
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn create(&self, user_id: Uuid) -> CacheResult<String> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
        };
        let json = serde_json::to_string(&session)?;

        let mut conn = self.redis.clone();
        conn.set_ex::<_, _, ()>(self.config.key(session.id), json, self.config.ttl_seconds)
            .await?;

        Ok(session.id.to_string())
    }

    async fn get_by_id(&self, id: &str) -> CacheResult<Session> {
        let mut conn = self.redis.clone();
        let json: Option<String> = conn.get(self.config.key(id)).await?;
        let json = json.ok_or(CacheError::Miss)?;
        Ok(serde_json::from_str(&json)?)
    }

    async fn delete_by_id(&self, id: &str) -> CacheResult<()> {
        let mut conn = self.redis.clone();
        conn.del::<_, ()>(self.config.key(id)).await?;
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    entries: ExpiringMap,
    config: SessionConfig,
}

impl InMemorySessionStore {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            entries: ExpiringMap::default(),
            config,
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, user_id: Uuid) -> CacheResult<String> {
        let session = Session {
            id: Uuid::new_v4(),
            user_id,
        };
        self.entries
            .put(self.config.key(session.id), &session, self.config.ttl())
            .await?;
        Ok(session.id.to_string())
    }

    async fn get_by_id(&self, id: &str) -> CacheResult<Session> {
        self.entries.fetch(&self.config.key(id)).await
    }

    async fn delete_by_id(&self, id: &str) -> CacheResult<()> {
        self.entries.remove(&self.config.key(id)).await;
        Ok(())
    }
}
