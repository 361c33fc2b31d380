//! User identity and session management.
//!
//! This crate provides the identity core behind the HTTP server:
//! - Account registration, login, update, delete and lookup
//! - Argon2id credential hashing
//! - HS256 bearer token issuance
//! - A read-through user cache and a TTL session store (Redis or in-memory)
//! - Durable user storage (PostgreSQL or in-memory)
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use auth_identity::{IdentityConfig, IdentityService, NewUser};
//! use auth_identity::cache::InMemoryUserCache;
//! use auth_identity::store::InMemoryUserStore;
//!
//! # async fn run() -> auth_identity::Result<()> {
//! let config = IdentityConfig::default();
//! let service = IdentityService::new(
//!     Arc::new(InMemoryUserStore::new()),
//!     Arc::new(InMemoryUserCache::new(config.user_cache.clone())),
//!     &config,
//! );
//!
//! let registered = service
//!     .register(NewUser {
//!         username: "ann".into(),
//!         email: "ann@example.com".into(),
//!         password: "secret1".into(),
//!         role: None,
//!         avatar: None,
//!     })
//!     .await?;
//! println!("token: {}", registered.token);
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod credentials;
pub mod error;
pub mod models;
pub mod pagination;
pub mod service;
pub mod session;
pub mod store;
pub mod token;

pub use config::IdentityConfig;
pub use error::{CacheError, IdentityError, Result, StoreError};
pub use models::*;
pub use pagination::{PaginationError, PaginationQuery};
pub use service::{IdentityService, SessionService};
