use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::UserStore;
use crate::error::{StoreError, StoreResult};
use crate::models::{NewUserRecord, User, UserChanges, UserPage, DEFAULT_ROLE};
use crate::pagination::{OrderColumn, PaginationQuery};

/// In-memory user store with the same uniqueness rules as the `users` table.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<Uuid, User>>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

fn conflicts(existing: &User, id: Option<Uuid>, username: Option<&str>, email: Option<&str>) -> bool {
    if Some(existing.id) == id {
        return false;
    }
    username.is_some_and(|u| existing.username == u)
        || email.is_some_and(|e| existing.email.as_deref() == Some(e))
}

fn page_of(mut users: Vec<User>, order: OrderColumn, query: &PaginationQuery) -> UserPage {
    let total = i64::try_from(users.len()).unwrap_or(i64::MAX);
    if total == 0 {
        return UserPage::empty(query);
    }

    users.sort_by(|a, b| {
        let primary = match order {
            OrderColumn::Username => a.username.cmp(&b.username),
            OrderColumn::Email => a.email.cmp(&b.email),
            OrderColumn::Role => a.role.cmp(&b.role),
            OrderColumn::CreatedAt => a.created_at.cmp(&b.created_at),
            OrderColumn::UpdatedAt => a.updated_at.cmp(&b.updated_at),
            OrderColumn::LoginDate => a.login_date.cmp(&b.login_date),
        };
        primary.then_with(|| a.id.cmp(&b.id))
    });

    let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(query.limit()).unwrap_or(usize::MAX);
    let rows = users
        .into_iter()
        .skip(offset)
        .take(limit)
        .map(User::sanitized)
        .collect();

    UserPage::new(total, query, rows)
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn create(&self, user: NewUserRecord) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users
            .values()
            .any(|u| conflicts(u, None, Some(&user.username), Some(&user.email)))
        {
            return Err(StoreError::Conflict);
        }

        let now = Utc::now();
        let role = user
            .role
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());
        let record = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: Some(user.email),
            password_hash: Some(user.password_hash),
            role: Some(role),
            avatar: user.avatar,
            created_at: now,
            updated_at: now,
            login_date: now,
        };
        users.insert(record.id, record.clone());
        Ok(record.sanitized())
    }

    async fn update(&self, id: Uuid, changes: UserChanges) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if !users.contains_key(&id) {
            return Err(StoreError::NotFound);
        }
        if users
            .values()
            .any(|u| conflicts(u, Some(id), changes.username.as_deref(), changes.email.as_deref()))
        {
            return Err(StoreError::Conflict);
        }

        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        if let Some(username) = changes.username.filter(|v| !v.is_empty()) {
            user.username = username;
        }
        if let Some(email) = changes.email.filter(|v| !v.is_empty()) {
            user.email = Some(email);
        }
        if let Some(role) = changes.role.filter(|v| !v.is_empty()) {
            user.role = Some(role);
        }
        if let Some(avatar) = changes.avatar.filter(|v| !v.is_empty()) {
            user.avatar = Some(avatar);
        }
        user.updated_at = Utc::now();
        Ok(user.clone().sanitized())
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.users
            .write()
            .await
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_id(&self, id: Uuid) -> StoreResult<User> {
        self.users
            .read()
            .await
            .get(&id)
            .cloned()
            .map(User::sanitized)
            .ok_or(StoreError::NotFound)
    }

    async fn get_by_email(&self, email: &str) -> StoreResult<User> {
        self.users
            .read()
            .await
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn find_by_username(&self, username: &str, query: &PaginationQuery) -> StoreResult<UserPage> {
        let needle = username.to_lowercase();
        let matches = self
            .users
            .read()
            .await
            .values()
            .filter(|u| u.username.to_lowercase().contains(&needle))
            .cloned()
            .collect();
        Ok(page_of(matches, OrderColumn::Username, query))
    }

    async fn list_users(&self, query: &PaginationQuery) -> StoreResult<UserPage> {
        let all = self.users.read().await.values().cloned().collect();
        Ok(page_of(all, query.order_column(), query))
    }

    async fn record_login(&self, id: Uuid) -> StoreResult<()> {
        let mut users = self.users.write().await;
        let user = users.get_mut(&id).ok_or(StoreError::NotFound)?;
        user.login_date = Utc::now();
        Ok(())
    }
}
