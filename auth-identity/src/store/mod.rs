//! Durable user storage.
//!
//! [`PostgresUserStore`] is the production backend; [`InMemoryUserStore`]
//! enforces the same uniqueness rules for tests and local development.

mod memory;
mod postgres;

pub use memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreResult;
use crate::models::{NewUserRecord, User, UserChanges, UserPage};
use crate::pagination::PaginationQuery;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Inserts a user with a server-assigned ID and timestamps. A blank role
    /// is stored as the default role.
    async fn create(&self, user: NewUserRecord) -> StoreResult<User>;

    /// Applies the non-empty fields of `changes`, leaving the rest untouched.
    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<User>;

    async fn delete(&self, id: Uuid) -> StoreResult<()>;

    async fn get_by_id(&self, id: Uuid) -> StoreResult<User>;

    /// The only lookup that returns the password hash.
    async fn get_by_email(&self, email: &str) -> StoreResult<User>;

    /// Case-insensitive substring match on username, ordered by username.
    async fn find_by_username(&self, username: &str, query: &PaginationQuery) -> StoreResult<UserPage>;

    async fn list_users(&self, query: &PaginationQuery) -> StoreResult<UserPage>;

    /// Stamps `login_date` with the current time.
    async fn record_login(&self, id: Uuid) -> StoreResult<()>;
}
