use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use auth_identity::cache::{InMemoryUserCache, RedisUserCache};
use auth_identity::session::{InMemorySessionStore, RedisSessionStore};
use auth_identity::store::{InMemoryUserStore, PostgresUserStore};
use auth_identity::{IdentityService, SessionService};
use redis::aio::ConnectionManager;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;

use crate::config::{PostgresConfig, ServerConfig};

/// Shared handler state. Cloning is cheap.
#[derive(Clone)]
pub struct IdentityServer {
    pub config: Arc<ServerConfig>,
    pub identity: IdentityService,
    pub sessions: SessionService,
    backends: Backends,
}

/// Connections probed by the health endpoint. Absent when running in memory.
#[derive(Clone, Default)]
struct Backends {
    postgres: Option<PgPool>,
    redis: Option<ConnectionManager>,
}

impl IdentityServer {
    /// Connects to PostgreSQL and Redis and wires the identity components.
    pub async fn connect(config: ServerConfig) -> Result<Self> {
        let pool = connect_postgres(&config.postgres).await?;
        let store = PostgresUserStore::new(pool.clone());
        if config.postgres.run_migrations {
            store
                .run_migrations()
                .await
                .context("Failed to run database migrations")?;
            info!("database migrations applied");
        }

        let client = redis::Client::open(config.redis.url.as_str())
            .context("Failed to create Redis client")?;
        let redis = ConnectionManager::new(client)
            .await
            .context("Failed to connect to Redis")?;

        let identity = IdentityService::new(
            Arc::new(store),
            Arc::new(RedisUserCache::new(redis.clone(), config.identity.user_cache.clone())),
            &config.identity,
        );
        let sessions = SessionService::new(Arc::new(RedisSessionStore::new(
            redis.clone(),
            config.identity.session.clone(),
        )));

        Ok(Self {
            config: Arc::new(config),
            identity,
            sessions,
            backends: Backends {
                postgres: Some(pool),
                redis: Some(redis),
            },
        })
    }

    /// Process-local backends, for tests and local development.
    pub fn in_memory(config: ServerConfig) -> Self {
        let identity = IdentityService::new(
            Arc::new(InMemoryUserStore::new()),
            Arc::new(InMemoryUserCache::new(config.identity.user_cache.clone())),
            &config.identity,
        );
        let sessions = SessionService::new(Arc::new(InMemorySessionStore::new(
            config.identity.session.clone(),
        )));

        Self {
            config: Arc::new(config),
            identity,
            sessions,
            backends: Backends::default(),
        }
    }

    /// `None` when the server runs without a database.
    pub async fn check_postgres(&self) -> Option<Result<()>> {
        let pool = self.backends.postgres.as_ref()?;
        Some(
            sqlx::query("SELECT 1")
                .execute(pool)
                .await
                .map(|_| ())
                .context("PostgreSQL ping failed"),
        )
    }

    pub async fn check_redis(&self) -> Option<Result<()>> {
        let mut conn = self.backends.redis.clone()?;
        Some(
            redis::cmd("PING")
                .query_async::<_, String>(&mut conn)
                .await
                .map(|_| ())
                .context("Redis ping failed"),
        )
    }
}

async fn connect_postgres(config: &PostgresConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_seconds))
        .idle_timeout(Some(Duration::from_secs(config.idle_timeout_seconds)))
        .max_lifetime(Some(Duration::from_secs(config.max_lifetime_seconds)))
        .connect(&config.url)
        .await
        .context("Failed to connect to PostgreSQL")
}
