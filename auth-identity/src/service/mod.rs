//! Identity use cases: register, login, update, delete, fetch, search, list.
//!
//! Each operation is a short pipeline over the user store, the user cache and
//! the credential codec. Storage errors are translated into [`IdentityError`]
//! here and nowhere else.

mod session;

pub use session::SessionService;

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use crate::cache::UserCache;
use crate::config::IdentityConfig;
use crate::credentials::CredentialCodec;
use crate::error::{CacheError, IdentityError, Result, StoreError};
use crate::models::{normalize_email, Credentials, NewUser, NewUserRecord, User, UserChanges, UserPage, UserWithToken};
use crate::pagination::PaginationQuery;
use crate::store::UserStore;
use crate::token::TokenIssuer;

#[derive(Clone)]
pub struct IdentityService {
    store: Arc<dyn UserStore>,
    cache: Arc<dyn UserCache>,
    codec: CredentialCodec,
    tokens: TokenIssuer,
}

impl IdentityService {
    pub fn new(store: Arc<dyn UserStore>, cache: Arc<dyn UserCache>, config: &IdentityConfig) -> Self {
        Self {
            store,
            cache,
            codec: CredentialCodec::new(),
            tokens: TokenIssuer::new(&config.token),
        }
    }

    /// Creates an account and mints its first token.
    ///
    /// The email probe fails closed: any lookup outcome other than "not
    /// found" rejects the registration as a conflict.
    #[instrument(skip_all, fields(username = %input.username))]
    pub async fn register(&self, input: NewUser) -> Result<UserWithToken> {
        let input = input.normalized();

        match self.store.get_by_email(&input.email).await {
            Err(StoreError::NotFound) => {}
            Ok(_) => return Err(IdentityError::Conflict),
            Err(err) => {
                warn!(error = %err, "email lookup failed during registration");
                return Err(IdentityError::Conflict);
            }
        }

        let password_hash = self.codec.hash(&input.password).await?;
        let user = self
            .store
            .create(NewUserRecord {
                username: input.username,
                email: input.email,
                password_hash,
                role: input.role,
                avatar: input.avatar,
            })
            .await?;

        let token = self.tokens.mint(&user)?;
        debug!(user_id = %user.id, "user registered");

        Ok(UserWithToken {
            user: user.sanitized(),
            token,
        })
    }

    /// Unknown email and wrong password both yield `Unauthorized`.
    #[instrument(skip_all)]
    pub async fn login(&self, credentials: Credentials) -> Result<UserWithToken> {
        let email = normalize_email(&credentials.email);

        let mut user = match self.store.get_by_email(&email).await {
            Ok(user) => user,
            Err(StoreError::NotFound) => return Err(IdentityError::Unauthorized),
            Err(err) => return Err(err.into()),
        };

        let hash = user.password_hash.as_deref().ok_or(IdentityError::Unauthorized)?;
        if !self.codec.verify(hash, &credentials.password).await? {
            return Err(IdentityError::Unauthorized);
        }

        self.touch_login(&mut user).await;

        let token = self.tokens.mint(&user)?;
        debug!(user_id = %user.id, "user logged in");

        Ok(UserWithToken {
            user: user.sanitized(),
            token,
        })
    }

    async fn touch_login(&self, user: &mut User) {
        if let Err(err) = self.store.record_login(user.id).await {
            warn!(user_id = %user.id, error = %err, "failed to record login time");
            return;
        }
        user.login_date = Utc::now();

        if let Err(err) = self.cache.delete(user.id).await {
            warn!(user_id = %user.id, error = %err, "failed to evict user cache after login");
        }
    }

    /// Applies a partial update, then evicts the cache entry for `id`.
    #[instrument(skip(self, changes))]
    pub async fn update(&self, id: Uuid, changes: UserChanges) -> Result<User> {
        let changes = changes.normalized();
        if changes.is_empty() {
            return Err(IdentityError::MissingFields);
        }

        let user = self.store.update(id, changes).await?;
        self.cache.delete(id).await?;

        Ok(user.sanitized())
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        self.store.delete(id).await?;
        self.cache.delete(id).await?;
        Ok(())
    }

    /// Cache-aside read. Cache failures degrade to a store read; populating
    /// the cache afterwards is best-effort.
    #[instrument(skip(self))]
    pub async fn get_by_id(&self, id: Uuid) -> Result<User> {
        match self.cache.get_by_id(id).await {
            Ok(user) => {
                debug!("user cache hit");
                return Ok(user);
            }
            Err(CacheError::Miss) => {}
            Err(err) => warn!(error = %err, "user cache read failed, reading from store"),
        }

        let user = self.store.get_by_id(id).await?.sanitized();

        if let Err(err) = self.cache.set(&user).await {
            warn!(error = %err, "failed to populate user cache");
        }

        Ok(user)
    }

    #[instrument(skip(self))]
    pub async fn find_by_username(&self, username: &str, query: &PaginationQuery) -> Result<UserPage> {
        Ok(self.store.find_by_username(username, query).await?)
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self, query: &PaginationQuery) -> Result<UserPage> {
        Ok(self.store.list_users(query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockUserCache;
    use crate::store::MockUserStore;

    fn user(id: Uuid) -> User {
        let now = Utc::now();
        User {
            id,
            username: "ann".into(),
            email: Some("ann@x.com".into()),
            password_hash: None,
            role: Some("user".into()),
            avatar: None,
            created_at: now,
            updated_at: now,
            login_date: now,
        }
    }

    fn new_user() -> NewUser {
        NewUser {
            username: "ann".into(),
            email: " Ann@X.com ".into(),
            password: "secret1".into(),
            role: None,
            avatar: None,
        }
    }

    fn backend_error() -> CacheError {
        CacheError::Backend(redis::RedisError::from((redis::ErrorKind::IoError, "connection reset")))
    }

    fn service(store: MockUserStore, cache: MockUserCache) -> IdentityService {
        IdentityService::new(Arc::new(store), Arc::new(cache), &IdentityConfig::default())
    }

    #[tokio::test]
    async fn register_probes_normalized_email() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_email()
            .withf(|email: &str| email == "ann@x.com")
            .times(1)
            .returning(|_| Err(StoreError::NotFound));
        store
            .expect_create()
            .withf(|record: &NewUserRecord| {
                record.email == "ann@x.com" && record.password_hash.starts_with("$argon2id$")
            })
            .times(1)
            .returning(|_| Ok(user(Uuid::new_v4())));

        let out = service(store, MockUserCache::new()).register(new_user()).await.unwrap();
        assert!(!out.token.is_empty());
        assert!(out.user.password_hash.is_none());
    }

    #[tokio::test]
    async fn register_existing_email_conflicts() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_email()
            .returning(|_| Ok(user(Uuid::new_v4())));
        store.expect_create().never();

        let err = service(store, MockUserCache::new()).register(new_user()).await.unwrap_err();
        assert!(matches!(err, IdentityError::Conflict));
    }

    #[tokio::test]
    async fn register_fails_closed_when_probe_errors() {
        let mut store = MockUserStore::new();
        store
            .expect_get_by_email()
            .returning(|_| Err(StoreError::Storage(sqlx::Error::PoolTimedOut)));
        store.expect_create().never();

        let err = service(store, MockUserCache::new()).register(new_user()).await.unwrap_err();
        assert!(matches!(err, IdentityError::Conflict));
    }

    #[tokio::test]
    async fn register_race_on_insert_is_conflict() {
        let mut store = MockUserStore::new();
        store.expect_get_by_email().returning(|_| Err(StoreError::NotFound));
        store.expect_create().returning(|_| Err(StoreError::Conflict));

        let err = service(store, MockUserCache::new()).register(new_user()).await.unwrap_err();
        assert!(matches!(err, IdentityError::Conflict));
    }

    #[tokio::test]
    async fn login_unknown_email_is_unauthorized() {
        let mut store = MockUserStore::new();
        store.expect_get_by_email().returning(|_| Err(StoreError::NotFound));

        let err = service(store, MockUserCache::new())
            .login(Credentials {
                email: "ghost@x.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Unauthorized));
    }

    #[tokio::test]
    async fn login_wrong_password_is_unauthorized() {
        let hash = CredentialCodec::new().hash("secret1").await.unwrap();
        let mut store = MockUserStore::new();
        store.expect_get_by_email().returning(move |_| {
            let mut stored = user(Uuid::new_v4());
            stored.password_hash = Some(hash.clone());
            Ok(stored)
        });
        store.expect_record_login().never();

        let err = service(store, MockUserCache::new())
            .login(Credentials {
                email: "ann@x.com".into(),
                password: "wrong-one".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Unauthorized));
    }

    #[tokio::test]
    async fn login_survives_login_stamp_failure() {
        let hash = CredentialCodec::new().hash("secret1").await.unwrap();
        let mut store = MockUserStore::new();
        store.expect_get_by_email().returning(move |_| {
            let mut stored = user(Uuid::new_v4());
            stored.password_hash = Some(hash.clone());
            Ok(stored)
        });
        store
            .expect_record_login()
            .returning(|_| Err(StoreError::Storage(sqlx::Error::PoolClosed)));
        let mut cache = MockUserCache::new();
        cache.expect_delete().never();

        let out = service(store, cache)
            .login(Credentials {
                email: "ANN@x.com".into(),
                password: "secret1".into(),
            })
            .await
            .unwrap();
        assert!(out.user.password_hash.is_none());
        assert!(!out.token.is_empty());
    }

    #[tokio::test]
    async fn blank_update_never_touches_store() {
        let mut store = MockUserStore::new();
        store.expect_update().never();
        let mut cache = MockUserCache::new();
        cache.expect_delete().never();

        let changes = UserChanges {
            username: Some("   ".into()),
            email: Some(String::new()),
            ..UserChanges::default()
        };
        let err = service(store, cache).update(Uuid::new_v4(), changes).await.unwrap_err();
        assert!(matches!(err, IdentityError::MissingFields));
    }

    #[tokio::test]
    async fn update_evicts_cache() {
        let id = Uuid::new_v4();
        let mut store = MockUserStore::new();
        store
            .expect_update()
            .withf(move |uid, changes| *uid == id && changes.role.as_deref() == Some("admin"))
            .returning(|uid, _| Ok(user(uid)));
        let mut cache = MockUserCache::new();
        cache
            .expect_delete()
            .withf(move |uid| *uid == id)
            .times(1)
            .returning(|_| Ok(()));

        let changes = UserChanges {
            role: Some("ADMIN".into()),
            ..UserChanges::default()
        };
        let updated = service(store, cache).update(id, changes).await.unwrap();
        assert_eq!(updated.id, id);
    }

    #[tokio::test]
    async fn update_reports_failed_eviction() {
        let mut store = MockUserStore::new();
        store.expect_update().returning(|uid, _| Ok(user(uid)));
        let mut cache = MockUserCache::new();
        cache.expect_delete().returning(|_| Err(backend_error()));

        let changes = UserChanges {
            username: Some("annie".into()),
            ..UserChanges::default()
        };
        let err = service(store, cache).update(Uuid::new_v4(), changes).await.unwrap_err();
        assert!(matches!(err, IdentityError::Internal(_)));
    }

    #[tokio::test]
    async fn update_missing_user_is_not_found() {
        let mut store = MockUserStore::new();
        store.expect_update().returning(|_, _| Err(StoreError::NotFound));
        let mut cache = MockUserCache::new();
        cache.expect_delete().never();

        let changes = UserChanges {
            username: Some("annie".into()),
            ..UserChanges::default()
        };
        let err = service(store, cache).update(Uuid::new_v4(), changes).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn delete_missing_user_skips_eviction() {
        let mut store = MockUserStore::new();
        store.expect_delete().returning(|_| Err(StoreError::NotFound));
        let mut cache = MockUserCache::new();
        cache.expect_delete().never();

        let err = service(store, cache).delete(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn delete_evicts_cache() {
        let mut store = MockUserStore::new();
        store.expect_delete().times(1).returning(|_| Ok(()));
        let mut cache = MockUserCache::new();
        cache.expect_delete().times(1).returning(|_| Ok(()));

        service(store, cache).delete(Uuid::new_v4()).await.unwrap();
    }

    #[tokio::test]
    async fn cache_hit_skips_store() {
        let id = Uuid::new_v4();
        let mut store = MockUserStore::new();
        store.expect_get_by_id().never();
        let mut cache = MockUserCache::new();
        cache.expect_get_by_id().returning(|uid| Ok(user(uid)));

        let found = service(store, cache).get_by_id(id).await.unwrap();
        assert_eq!(found.id, id);
    }

    #[tokio::test]
    async fn cache_miss_reads_store_and_populates() {
        let id = Uuid::new_v4();
        let mut store = MockUserStore::new();
        store.expect_get_by_id().times(1).returning(|uid| {
            let mut stored = user(uid);
            stored.password_hash = Some("hash".into());
            Ok(stored)
        });
        let mut cache = MockUserCache::new();
        cache.expect_get_by_id().returning(|_| Err(CacheError::Miss));
        cache
            .expect_set()
            .withf(|u: &User| u.password_hash.is_none())
            .times(1)
            .returning(|_| Ok(()));

        let found = service(store, cache).get_by_id(id).await.unwrap();
        assert!(found.password_hash.is_none());
    }

    #[tokio::test]
    async fn cache_failures_do_not_fail_reads() {
        let mut store = MockUserStore::new();
        store.expect_get_by_id().returning(|uid| Ok(user(uid)));
        let mut cache = MockUserCache::new();
        cache.expect_get_by_id().returning(|_| Err(backend_error()));
        cache.expect_set().returning(|_| Err(backend_error()));

        assert!(service(store, cache).get_by_id(Uuid::new_v4()).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_user_is_not_found() {
        let mut store = MockUserStore::new();
        store.expect_get_by_id().returning(|_| Err(StoreError::NotFound));
        let mut cache = MockUserCache::new();
        cache.expect_get_by_id().returning(|_| Err(CacheError::Miss));
        cache.expect_set().never();

        let err = service(store, cache).get_by_id(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, IdentityError::NotFound));
    }

    #[tokio::test]
    async fn listing_storage_failure_is_internal() {
        let mut store = MockUserStore::new();
        store
            .expect_list_users()
            .returning(|_| Err(StoreError::Storage(sqlx::Error::PoolTimedOut)));

        let err = service(store, MockUserCache::new())
            .list_users(&PaginationQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Internal(_)));
    }
}
