//! Order service configuration.
//!
//! Configuration is loaded from environment variables. The Redis connection
//! string is held as a `SecretString` and redacted in Debug output.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use secrecy::SecretString;
use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Default authority base URL.
pub const DEFAULT_JWT_AUTHORITY: &str = "http://localhost:8082";

/// Path of the JWKS document under the authority.
pub const JWKS_WELL_KNOWN_PATH: &str = "/.well-known/jwks.json";

/// Default refresh interval in minutes.
pub const DEFAULT_JWKS_REFRESH_INTERVAL_MINUTES: u64 = 5;

/// Default per-key cache TTL in minutes.
pub const DEFAULT_JWKS_CACHE_TTL_MINUTES: u64 = 10;

/// Default JWKS fetch timeout in seconds.
pub const DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS: u64 = 10;

/// Default Redis connection string.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Which [`JwksKeyCache`](crate::auth::JwksKeyCache) backend to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackend {
    InMemory,
    Distributed,
}

impl CacheBackend {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "in_memory" | "memory" | "inmemory" => Some(Self::InMemory),
            "distributed" | "redis" => Some(Self::Distributed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InMemory => "in_memory",
            Self::Distributed => "distributed",
        }
    }
}

#[derive(Clone)]
pub struct Config {
    /// Server bind address (default: "0.0.0.0:8080").
    pub bind_address: String,

    /// Authority base URL.
    pub jwt_authority: String,

    /// JWKS document URL, derived from the authority when not set.
    pub jwks_url: String,

    /// Expected `iss` claim.
    pub jwt_issuer: String,

    /// Expected `aud` claim.
    pub jwt_audience: String,

    /// Leeway applied to `exp`, `nbf` and `iat`.
    pub jwt_clock_skew: Duration,

    /// Background refresh period; also the minimum spacing of on-demand refreshes.
    pub jwks_refresh_interval: Duration,

    /// TTL applied to each cached key.
    pub jwks_cache_ttl: Duration,

    /// Per-request timeout for the JWKS fetch.
    pub jwks_fetch_timeout: Duration,

    pub cache_backend: CacheBackend,

    /// Redis connection string for the distributed backend.
    pub redis_url: SecretString,

    pub enable_background_refresh: bool,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("bind_address", &self.bind_address)
            .field("jwt_authority", &self.jwt_authority)
            .field("jwks_url", &self.jwks_url)
            .field("jwt_issuer", &self.jwt_issuer)
            .field("jwt_audience", &self.jwt_audience)
            .field("jwt_clock_skew", &self.jwt_clock_skew)
            .field("jwks_refresh_interval", &self.jwks_refresh_interval)
            .field("jwks_cache_ttl", &self.jwks_cache_ttl)
            .field("jwks_fetch_timeout", &self.jwks_fetch_timeout)
            .field("cache_backend", &self.cache_backend)
            .field("redis_url", &"[REDACTED]")
            .field("enable_background_refresh", &self.enable_background_refresh)
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid duration for {name}: {reason}")]
    InvalidDuration { name: String, reason: String },

    #[error("Invalid JWKS_CACHE_TYPE: expected 'in_memory' or 'distributed', got '{0}'")]
    InvalidCacheType(String),

    #[error("Invalid boolean for {name}: got '{value}'")]
    InvalidBool { name: String, value: String },

    #[error("Invalid value for {0}: must not be empty")]
    EmptyValue(String),
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8080".to_string());

        let jwt_authority = vars
            .get("JWT_AUTHORITY")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_JWT_AUTHORITY.to_string());

        let jwks_url = vars
            .get("JWT_JWKS_URL")
            .cloned()
            .unwrap_or_else(|| format!("{}{}", jwt_authority, JWKS_WELL_KNOWN_PATH));

        let jwt_issuer = non_empty(vars, "JWT_ISSUER", "user-service")?;
        let jwt_audience = non_empty(vars, "JWT_AUDIENCE", "order-service")?;

        let jwt_clock_skew = if let Some(value_str) = vars.get("JWT_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be a valid integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value == 0 || value > MAX_CLOCK_SKEW.as_secs() {
                return Err(ConfigError::InvalidJwtClockSkew(format!(
                    "JWT_CLOCK_SKEW_SECONDS must be between 1 and {}, got {}",
                    MAX_CLOCK_SKEW.as_secs(),
                    value
                )));
            }

            Duration::from_secs(value)
        } else {
            DEFAULT_CLOCK_SKEW
        };

        let jwks_refresh_interval = positive_duration(
            vars,
            "JWKS_REFRESH_INTERVAL_MINUTES",
            DEFAULT_JWKS_REFRESH_INTERVAL_MINUTES,
            60,
        )?;
        let jwks_cache_ttl = positive_duration(
            vars,
            "JWKS_CACHE_TTL_MINUTES",
            DEFAULT_JWKS_CACHE_TTL_MINUTES,
            60,
        )?;
        let jwks_fetch_timeout = positive_duration(
            vars,
            "JWKS_FETCH_TIMEOUT_SECONDS",
            DEFAULT_JWKS_FETCH_TIMEOUT_SECONDS,
            1,
        )?;

        let cache_backend = match vars.get("JWKS_CACHE_TYPE") {
            Some(value) => CacheBackend::parse(value)
                .ok_or_else(|| ConfigError::InvalidCacheType(value.clone()))?,
            None => CacheBackend::InMemory,
        };

        let redis_url = SecretString::from(
            vars.get("REDIS_URL")
                .cloned()
                .unwrap_or_else(|| DEFAULT_REDIS_URL.to_string()),
        );

        let enable_background_refresh = match vars.get("JWKS_ENABLE_BACKGROUND_REFRESH") {
            Some(value) => parse_bool(value).ok_or_else(|| ConfigError::InvalidBool {
                name: "JWKS_ENABLE_BACKGROUND_REFRESH".to_string(),
                value: value.clone(),
            })?,
            None => true,
        };

        Ok(Config {
            bind_address,
            jwt_authority,
            jwks_url,
            jwt_issuer,
            jwt_audience,
            jwt_clock_skew,
            jwks_refresh_interval,
            jwks_cache_ttl,
            jwks_fetch_timeout,
            cache_backend,
            redis_url,
            enable_background_refresh,
        })
    }
}

fn non_empty(
    vars: &HashMap<String, String>,
    name: &str,
    default: &str,
) -> Result<String, ConfigError> {
    match vars.get(name) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(name.to_string())),
        Some(value) => Ok(value.clone()),
        None => Ok(default.to_string()),
    }
}

/// Parse a strictly positive integer `name` scaled by `unit_secs`.
fn positive_duration(
    vars: &HashMap<String, String>,
    name: &str,
    default: u64,
    unit_secs: u64,
) -> Result<Duration, ConfigError> {
    let value = match vars.get(name) {
        Some(value_str) => value_str
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidDuration {
                name: name.to_string(),
                reason: format!("must be a positive integer, got '{}': {}", value_str, e),
            })?,
        None => default,
    };

    if value == 0 {
        return Err(ConfigError::InvalidDuration {
            name: name.to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    let secs = value
        .checked_mul(unit_secs)
        .ok_or_else(|| ConfigError::InvalidDuration {
            name: name.to_string(),
            reason: format!("value {} is too large", value),
        })?;

    Ok(Duration::from_secs(secs))
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_from_vars_defaults() {
        let config = Config::from_vars(&HashMap::new()).expect("Config should load");

        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.jwt_authority, "http://localhost:8082");
        assert_eq!(
            config.jwks_url,
            "http://localhost:8082/.well-known/jwks.json"
        );
        assert_eq!(config.jwt_issuer, "user-service");
        assert_eq!(config.jwt_audience, "order-service");
        assert_eq!(config.jwt_clock_skew, DEFAULT_CLOCK_SKEW);
        assert_eq!(config.jwks_refresh_interval, Duration::from_secs(300));
        assert_eq!(config.jwks_cache_ttl, Duration::from_secs(600));
        assert_eq!(config.jwks_fetch_timeout, Duration::from_secs(10));
        assert_eq!(config.cache_backend, CacheBackend::InMemory);
        assert_eq!(config.redis_url.expose_secret(), "redis://localhost:6379");
        assert!(config.enable_background_refresh);
    }

    #[test]
    fn test_jwks_url_derived_from_authority() {
        let vars = HashMap::from([(
            "JWT_AUTHORITY".to_string(),
            "https://auth.example.com/".to_string(),
        )]);

        let config = Config::from_vars(&vars).unwrap();

        assert_eq!(config.jwt_authority, "https://auth.example.com");
        assert_eq!(
            config.jwks_url,
            "https://auth.example.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn test_explicit_jwks_url_wins() {
        let vars = HashMap::from([
            (
                "JWT_AUTHORITY".to_string(),
                "https://auth.example.com".to_string(),
            ),
            (
                "JWT_JWKS_URL".to_string(),
                "https://keys.example.com/jwks".to_string(),
            ),
        ]);

        let config = Config::from_vars(&vars).unwrap();
        assert_eq!(config.jwks_url, "https://keys.example.com/jwks");
    }

    #[test]
    fn test_cache_type_parsing() {
        for (value, expected) in [
            ("in_memory", CacheBackend::InMemory),
            ("distributed", CacheBackend::Distributed),
            ("Redis", CacheBackend::Distributed),
        ] {
            let vars = HashMap::from([("JWKS_CACHE_TYPE".to_string(), value.to_string())]);
            assert_eq!(Config::from_vars(&vars).unwrap().cache_backend, expected);
        }

        let vars = HashMap::from([("JWKS_CACHE_TYPE".to_string(), "memcached".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidCacheType(v)) if v == "memcached"
        ));
    }

    #[test]
    fn test_zero_durations_rejected() {
        for name in [
            "JWKS_REFRESH_INTERVAL_MINUTES",
            "JWKS_CACHE_TTL_MINUTES",
            "JWKS_FETCH_TIMEOUT_SECONDS",
        ] {
            let vars = HashMap::from([(name.to_string(), "0".to_string())]);
            assert!(
                matches!(
                    Config::from_vars(&vars),
                    Err(ConfigError::InvalidDuration { name: n, .. }) if n == name
                ),
                "{name}=0 should be rejected"
            );
        }
    }

    #[test]
    fn test_clock_skew_bounds() {
        let vars = HashMap::from([("JWT_CLOCK_SKEW_SECONDS".to_string(), "600".to_string())]);
        assert_eq!(
            Config::from_vars(&vars).unwrap().jwt_clock_skew,
            Duration::from_secs(600)
        );

        let vars = HashMap::from([("JWT_CLOCK_SKEW_SECONDS".to_string(), "601".to_string())]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidJwtClockSkew(_))
        ));
    }

    #[test]
    fn test_background_refresh_flag() {
        let vars = HashMap::from([(
            "JWKS_ENABLE_BACKGROUND_REFRESH".to_string(),
            "false".to_string(),
        )]);
        assert!(!Config::from_vars(&vars).unwrap().enable_background_refresh);

        let vars = HashMap::from([(
            "JWKS_ENABLE_BACKGROUND_REFRESH".to_string(),
            "maybe".to_string(),
        )]);
        assert!(matches!(
            Config::from_vars(&vars),
            Err(ConfigError::InvalidBool { .. })
        ));
    }

    #[test]
    fn test_debug_redacts_redis_url() {
        let vars = HashMap::from([(
            "REDIS_URL".to_string(),
            "redis://:hunter2@cache.internal:6379".to_string(),
        )]);
        let config = Config::from_vars(&vars).unwrap();

        let debug = format!("{:?}", config);
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains("hunter2"));
    }
}
