use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings for the identity subsystem, passed into each component at construction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityConfig {
    pub token: TokenConfig,
    pub user_cache: CacheConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    /// HMAC secret used to sign bearer tokens.
    pub secret: String,
    pub ttl_seconds: u64,
    pub issuer: String,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            secret: "change-me-in-production".to_string(),
            ttl_seconds: 86_400,
            issuer: "identity-server".to_string(),
        }
    }
}

impl TokenConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

/// Key prefix and TTL for the read-through user cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub prefix: String,
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: "api-auth".to_string(),
            ttl_seconds: 3_600,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn key(&self, id: impl std::fmt::Display) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub prefix: String,
    pub ttl_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            prefix: "session".to_string(),
            ttl_seconds: 86_400,
        }
    }
}

impl SessionConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn key(&self, id: impl std::fmt::Display) -> String {
        format!("{}:{}", self.prefix, id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefixed() {
        let cache = CacheConfig::default();
        assert_eq!(cache.key("42"), "api-auth:42");

        let session = SessionConfig {
            prefix: "sess".to_string(),
            ttl_seconds: 10,
        };
        assert_eq!(session.key("abc"), "sess:abc");
        assert_eq!(session.ttl(), Duration::from_secs(10));
    }

    #[test]
    fn partial_config_falls_back_to_defaults() {
        let cfg: IdentityConfig =
            serde_json::from_str(r#"{ "token": { "secret": "s3cret" } }"#).unwrap();
        assert_eq!(cfg.token.secret, "s3cret");
        assert_eq!(cfg.token.ttl_seconds, 86_400);
        assert_eq!(cfg.user_cache.prefix, "api-auth");
        assert_eq!(cfg.session.ttl_seconds, 86_400);
    }
}
