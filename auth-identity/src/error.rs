use thiserror::Error;

/// Domain errors surfaced by the identity use cases.
///
/// Every storage-level failure is translated into one of these variants
/// exactly once, at the [`crate::IdentityService`] boundary.
#[derive(Error, Debug)]
pub enum IdentityError {
    #[error("user not found")]
    NotFound,

    #[error("user with the given email or username already exists")]
    Conflict,

    #[error("unauthorized")]
    Unauthorized,

    #[error("no fields to update")]
    MissingFields,

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Failures reported by a [`crate::store::UserStore`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("unique constraint violated")]
    Conflict,

    #[error("storage failure: {0}")]
    Storage(#[source] sqlx::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Postgres SQLSTATE for `unique_violation`.
const UNIQUE_VIOLATION: &str = "23505";

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => StoreError::NotFound,
            sqlx::Error::Database(ref db_err)
                if db_err.is_unique_violation()
                    || db_err.code().as_deref() == Some(UNIQUE_VIOLATION) =>
            {
                StoreError::Conflict
            }
            other => StoreError::Storage(other),
        }
    }
}

/// Failures reported by the TTL key/value backends (user cache, session store).
#[derive(Error, Debug)]
pub enum CacheError {
    /// Key absent or expired. A normal outcome, never shown to clients.
    #[error("cache miss")]
    Miss,

    #[error("cache backend failure: {0}")]
    Backend(#[from] redis::RedisError),

    #[error("cache entry codec failure: {0}")]
    Codec(#[from] serde_json::Error),
}

pub type CacheResult<T> = std::result::Result<T, CacheError>;

#[derive(Error, Debug)]
pub enum CodecError {
    #[error("password hashing failed: {0}")]
    Hash(String),

    #[error("stored password hash is malformed: {0}")]
    MalformedHash(String),

    #[error("password hashing task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("token signing failed: {0}")]
    Signing(#[from] jsonwebtoken::errors::Error),
}

impl From<StoreError> for IdentityError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => IdentityError::NotFound,
            StoreError::Conflict => IdentityError::Conflict,
            StoreError::Storage(e) => IdentityError::Internal(anyhow::Error::new(e).context("user store")),
        }
    }
}

impl From<CacheError> for IdentityError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::Miss => IdentityError::NotFound,
            other => IdentityError::Internal(anyhow::Error::new(other).context("cache backend")),
        }
    }
}

impl From<CodecError> for IdentityError {
    fn from(err: CodecError) -> Self {
        IdentityError::Internal(anyhow::Error::new(err))
    }
}

impl From<TokenError> for IdentityError {
    fn from(err: TokenError) -> Self {
        IdentityError::Internal(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_errors_translate_to_domain_kinds() {
        assert!(matches!(IdentityError::from(StoreError::NotFound), IdentityError::NotFound));
        assert!(matches!(IdentityError::from(StoreError::Conflict), IdentityError::Conflict));
        assert!(matches!(
            IdentityError::from(StoreError::Storage(sqlx::Error::PoolTimedOut)),
            IdentityError::Internal(_)
        ));
    }

    #[test]
    fn row_not_found_is_store_not_found() {
        assert!(matches!(StoreError::from(sqlx::Error::RowNotFound), StoreError::NotFound));
        assert!(matches!(StoreError::from(sqlx::Error::PoolClosed), StoreError::Storage(_)));
    }

    #[test]
    fn cache_backend_failure_is_internal() {
        let backend = CacheError::Backend(redis::RedisError::from((
            redis::ErrorKind::IoError,
            "connection refused",
        )));
        assert!(matches!(IdentityError::from(backend), IdentityError::Internal(_)));
    }
}
