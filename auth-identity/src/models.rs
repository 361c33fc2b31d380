use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::pagination::PaginationQuery;

/// Role assigned when a registration leaves it blank.
pub const DEFAULT_ROLE: &str = "user";

/// A stored user account.
///
/// `password_hash` is only populated on the email lookup path that backs
/// login, and is never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip)]
    #[sqlx(rename = "password", default)]
    pub password_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub login_date: DateTime<Utc>,
}

impl User {
    /// Drops the password hash before the record leaves the service.
    #[must_use]
    pub fn sanitized(mut self) -> Self {
        self.password_hash = None;
        self
    }
}

/// Registration payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewUser {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 30))]
    pub username: String,
    #[validate(length(min = 1, max = 60), email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub role: Option<String>,
    #[serde(default)]
    #[validate(length(max = 512), url)]
    pub avatar: Option<String>,
}

impl NewUser {
    /// Trims username, trims and lowercases email and role. Blank role/avatar
    /// become `None`.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.username = self.username.trim().to_string();
        self.email = normalize_email(&self.email);
        self.role = self.role.as_deref().and_then(normalize_role);
        self.avatar = self.avatar.as_deref().and_then(non_blank);
        self
    }
}

/// Row to insert, produced once the password has been hashed.
#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub role: Option<String>,
    pub avatar: Option<String>,
}

/// Login payload.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(length(min = 1, max = 60), email)]
    pub email: String,
    #[validate(length(min = 6))]
    pub password: String,
}

/// Partial update. Absent or blank fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserChanges {
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 30))]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 60), email)]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 10))]
    pub role: Option<String>,
    #[serde(default, deserialize_with = "blank_as_none")]
    #[validate(length(max = 512), url)]
    pub avatar: Option<String>,
}

impl UserChanges {
    #[must_use]
    pub fn normalized(self) -> Self {
        Self {
            username: self.username.as_deref().and_then(non_blank),
            email: self
                .email
                .as_deref()
                .and_then(non_blank)
                .map(|e| normalize_email(&e)),
            role: self.role.as_deref().and_then(normalize_role),
            avatar: self.avatar.as_deref().and_then(non_blank),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.email.is_none() && self.role.is_none() && self.avatar.is_none()
    }
}

/// A sanitized user paired with a freshly minted bearer token.
#[derive(Debug, Clone, Serialize)]
pub struct UserWithToken {
    pub user: User,
    pub token: String,
}

/// One page of a listing or search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserPage {
    pub total_count: i64,
    pub total_pages: i64,
    pub page: u32,
    pub size: u32,
    pub has_more: bool,
    pub users: Vec<User>,
}

impl UserPage {
    /// Derives every page field from `(total_count, page, size)`.
    pub fn new(total_count: i64, query: &PaginationQuery, users: Vec<User>) -> Self {
        Self {
            total_count,
            total_pages: query.total_pages(total_count),
            page: query.page,
            size: query.size,
            has_more: query.has_more(total_count),
            users,
        }
    }

    pub fn empty(query: &PaginationQuery) -> Self {
        Self::new(0, query, Vec::new())
    }
}

/// Cookie-backed login session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
}

pub(crate) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn normalize_role(role: &str) -> Option<String> {
    non_blank(role).map(|r| r.to_lowercase())
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn trimmed<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    Ok(value.trim().to_string())
}

fn blank_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(non_blank))
}
