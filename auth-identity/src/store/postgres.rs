use async_trait::async_trait;
use sqlx::{migrate::Migrator, PgPool};
use tracing::debug;
use uuid::Uuid;

use super::UserStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{NewUserRecord, User, UserChanges, UserPage, DEFAULT_ROLE};
use crate::pagination::PaginationQuery;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Public columns. `password` is deliberately absent; see `get_by_email`.
const USER_COLUMNS: &str = "id, username, email, role, avatar, created_at, updated_at, login_date";

#[derive(Clone)]
pub struct PostgresUserStore {
    pool: PgPool,
}

impl PostgresUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    async fn count(&self, sql: &str, filter: Option<&str>) -> StoreResult<i64> {
        let mut query = sqlx::query_scalar::<_, i64>(sql);
        if let Some(filter) = filter {
            query = query.bind(filter);
        }
        Ok(query.fetch_one(&self.pool).await?)
    }
}

/// Escapes LIKE metacharacters so the search term matches literally.
fn escape_like(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl UserStore for PostgresUserStore {
    async fn create(&self, user: NewUserRecord) -> StoreResult<User> {
        let sql = format!(
            r#"
            INSERT INTO users (id, username, email, password, role, avatar, created_at, updated_at, login_date)
            VALUES ($1, $2, $3, $4, COALESCE(NULLIF($5, ''), '{DEFAULT_ROLE}'), $6, now(), now(), now())
            RETURNING {USER_COLUMNS}
            "#
        );

        let created = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(&user.role)
            .bind(&user.avatar)
            .fetch_one(&self.pool)
            .await?;

        debug!(user_id = %created.id, "user row inserted");
        Ok(created)
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let sql = format!(
            r#"
            UPDATE users
            SET
                username = COALESCE(NULLIF($1, ''), username),
                email = COALESCE(NULLIF($2, ''), email),
                role = COALESCE(NULLIF($3, ''), role),
                avatar = COALESCE(NULLIF($4, ''), avatar),
                updated_at = now()
            WHERE id = $5
            RETURNING {USER_COLUMNS}
            "#
        );

        sqlx::query_as::<_, User>(&sql)
            .bind(&changes.username)
            .bind(&changes.email)
            .bind(&changes.role)
            .bind(&changes.avatar)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        let sql = format!("SELECT {USER_COLUMNS}, password FROM users WHERE email = $1");
        sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_username(&self, username: &str, query: &PaginationQuery) -> StoreResult<UserPage> {
        let pattern = escape_like(username);
        let total = self
            .count(
                "SELECT COUNT(id) FROM users WHERE username ILIKE '%' || $1 || '%'",
                Some(&pattern),
            )
            .await?;

        if total == 0 {
            return Ok(UserPage::empty(query));
        }

        let sql = format!(
            r#"
            SELECT {USER_COLUMNS}
            FROM users
            WHERE username ILIKE '%' || $1 || '%'
            ORDER BY username, id
            OFFSET $2 LIMIT $3
            "#
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(&pattern)
            .bind(query.offset())
            .bind(query.limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(UserPage::new(total, query, users))
    }

    async fn list_users(&self, query: &PaginationQuery) -> StoreResult<UserPage> {
        let total = self.count("SELECT COUNT(id) FROM users", None).await?;

        if total == 0 {
            return Ok(UserPage::empty(query));
        }

        // Column name comes from a closed whitelist, never from raw input.
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users ORDER BY {}, id OFFSET $1 LIMIT $2",
            query.order_column().as_sql()
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(query.offset())
            .bind(query.limit())
            .fetch_all(&self.pool)
            .await?;

        Ok(UserPage::new(total, query, users))
    }

    async fn record_login(&self, id: Uuid) -> StoreResult<()> {
        let result = sqlx::query("UPDATE users SET login_date = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::escape_like;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like("ann"), "ann");
        assert_eq!(escape_like("50%_off"), "50\\%\\_off");
        assert_eq!(escape_like("a\\b"), "a\\\\b");
    }
}
