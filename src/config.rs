//! Protocol configuration and store connection settings
//!
//! Everything here is built once at startup and passed explicitly to the
//! issuer, verifier and room registry.

use std::time::Duration;

/// Default issuer claim for this trust domain
pub const DEFAULT_ISSUER: &str = "sfu-auth";

/// Protocol constants shared by the issuer, verifier and registry
#[derive(Debug, Clone)]
pub struct SfuConfig {
    /// Value of the `iss` claim; tokens with any other issuer are rejected
    pub issuer: String,
    /// Lifetime of `read` tokens
    pub read_ttl: Duration,
    /// Lifetime of `write` tokens and their single-use markers
    pub write_ttl: Duration,
    /// Tolerated clock drift when checking `exp` / `nbf`
    pub clock_skew: Duration,
    /// Store key prefix for single-use markers
    pub marker_prefix: String,
    /// Store key prefix for room records
    pub room_prefix: String,
    /// Sliding lifetime of a room record
    pub room_ttl: Duration,
    /// Batch size hint for keyspace scans
    pub scan_batch: usize,
}

impl Default for SfuConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_ISSUER.to_string(),
            read_ttl: Duration::from_secs(900),
            write_ttl: Duration::from_secs(30),
            clock_skew: Duration::from_secs(5),
            marker_prefix: "sfu:auth:jti:".to_string(),
            room_prefix: "sfu:room:".to_string(),
            room_ttl: Duration::from_secs(60),
            scan_batch: 100,
        }
    }
}

impl SfuConfig {
    /// Override the issuer claim
    pub fn with_issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn marker_key(&self, token_id: &str) -> String {
        format!("{}{}", self.marker_prefix, token_id)
    }

    pub fn room_key(&self, room_name: &str) -> String {
        format!("{}{}", self.room_prefix, room_name)
    }
}

/// Redis connection parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub db: u32,
    pub ssl: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6379,
            username: None,
            password: None,
            db: 0,
            ssl: false,
        }
    }
}

impl RedisConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable lookup (the process environment in production)
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            host: non_empty("REDIS_HOST").unwrap_or(defaults.host),
            port: non_empty("REDIS_PORT")
                .and_then(|p| p.trim().parse().ok())
                .unwrap_or(defaults.port),
            username: non_empty("REDIS_USERNAME"),
            password: non_empty("REDIS_PASSWORD"),
            db: non_empty("REDIS_DB")
                .and_then(|d| d.trim().parse().ok())
                .unwrap_or(defaults.db),
            ssl: non_empty("REDIS_SSL").is_some_and(|v| is_truthy(&v)),
        }
    }

    /// Connection URL understood by the redis client
    pub fn url(&self) -> String {
        let scheme = if self.ssl { "rediss" } else { "redis" };

        // The implicit `default` ACL user is addressed with an empty username
        let username = self
            .username
            .as_deref()
            .filter(|u| *u != "default")
            .unwrap_or("");

        let auth = match (&self.password, username) {
            (Some(password), user) => format!("{}:{}@", user, password),
            (None, "") => String::new(),
            (None, user) => format!("{}@", user),
        };

        format!("{}://{}{}:{}/{}", scheme, auth, self.host, self.port, self.db)
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
