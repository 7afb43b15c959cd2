//! User service configuration.
//!
//! Configuration is loaded from environment variables.

use common::jwt::{DEFAULT_CLOCK_SKEW, MAX_CLOCK_SKEW};
use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Default location of the persisted signing key.
pub const DEFAULT_SIGNING_KEY_PATH: &str = "rsa_key.pem";

/// Default issuer claim.
pub const DEFAULT_JWT_ISSUER: &str = "user-service";

/// Default audience claim.
pub const DEFAULT_JWT_AUDIENCE: &str = "order-service";

/// Default access token validity in days.
pub const DEFAULT_ACCESS_TOKEN_VALIDITY_DAYS: u64 = 5;

/// Default refresh token validity in days.
pub const DEFAULT_REFRESH_TOKEN_VALIDITY_DAYS: u64 = 365;

/// Upper bound for either validity setting.
pub const MAX_TOKEN_VALIDITY_DAYS: u64 = 3650;

const SECONDS_PER_DAY: u64 = 86_400;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: String,
    pub signing_key_path: PathBuf,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub jwt_clock_skew: Duration,
    pub access_token_validity: Duration,
    pub refresh_token_validity: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid JWT clock skew configuration: {0}")]
    InvalidJwtClockSkew(String),

    #[error("Invalid token validity configuration: {0}")]
    InvalidTokenValidity(String),

    #[error("Invalid value for {0}: must not be empty")]
    EmptyValue(String),
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a HashMap (for testing)
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let bind_address = vars
            .get("BIND_ADDRESS")
            .cloned()
            .unwrap_or_else(|| "0.0.0.0:8082".to_string());

        let signing_key_path = PathBuf::from(
            vars.get("JWT_SIGNING_KEY_PATH")
                .map(String::as_str)
                .unwrap_or(DEFAULT_SIGNING_KEY_PATH),
        );

        let jwt_issuer = non_empty(vars, "JWT_ISSUER", DEFAULT_JWT_ISSUER)?;
        let jwt_audience = non_empty(vars, "JWT_AUDIENCE", DEFAULT_JWT_AUDIENCE)?;

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

        let access_token_validity = validity_days(
            vars,
            "JWT_ACCESS_TOKEN_VALIDITY_DAYS",
            DEFAULT_ACCESS_TOKEN_VALIDITY_DAYS,
        )?;
        let refresh_token_validity = validity_days(
            vars,
            "JWT_REFRESH_TOKEN_VALIDITY_DAYS",
            DEFAULT_REFRESH_TOKEN_VALIDITY_DAYS,
        )?;

        Ok(Config {
            bind_address,
            signing_key_path,
            jwt_issuer,
            jwt_audience,
            jwt_clock_skew,
            access_token_validity,
            refresh_token_validity,
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

fn validity_days(
    vars: &HashMap<String, String>,
    name: &str,
    default_days: u64,
) -> Result<Duration, ConfigError> {
    let days = match vars.get(name) {
        Some(value_str) => value_str.parse::<u64>().map_err(|e| {
            ConfigError::InvalidTokenValidity(format!(
                "{} must be a valid positive integer, got '{}': {}",
                name, value_str, e
            ))
        })?,
        None => default_days,
    };

    if days == 0 || days > MAX_TOKEN_VALIDITY_DAYS {
        return Err(ConfigError::InvalidTokenValidity(format!(
            "{} must be between 1 and {}, got {}",
            name, MAX_TOKEN_VALIDITY_DAYS, days
        )));
    }

    Ok(Duration::from_secs(days * SECONDS_PER_DAY))
}
