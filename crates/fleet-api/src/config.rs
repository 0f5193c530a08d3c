use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use http::HeaderValue;
use thiserror::Error;

const DEFAULT_MAX_BATCH_SIZE: usize = 500;
const MAX_BATCH_SIZE_LIMIT: usize = 5_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Origins allowed to call the API from a browser
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    /// No cross-origin access
    None,
    /// Any origin (`FLEET_ALLOWED_ORIGINS=*`)
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub run_migrations: bool,
    pub allowed_origins: AllowedOrigins,
    pub max_batch_size: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "FLEET_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = PathBuf::from(value_or_default(&lookup, "FLEET_DB_PATH", "fleet.db"));

        let run_migrations = parse_bool(&value_or_default(&lookup, "FLEET_RUN_MIGRATIONS", "true"))
            .ok_or_else(|| {
                ConfigError::Invalid("FLEET_RUN_MIGRATIONS must be true or false".to_string())
            })?;

        let allowed_origins = parse_allowed_origins(optional_trimmed(&lookup, "FLEET_ALLOWED_ORIGINS"))?;

        let max_batch_size = value_or_default(
            &lookup,
            "FLEET_MAX_BATCH_SIZE",
            &DEFAULT_MAX_BATCH_SIZE.to_string(),
        )
        .parse::<usize>()
        .map_err(|_| {
            ConfigError::Invalid(format!(
                "FLEET_MAX_BATCH_SIZE must be an integer in [1, {MAX_BATCH_SIZE_LIMIT}]"
            ))
        })?;
        if !(1..=MAX_BATCH_SIZE_LIMIT).contains(&max_batch_size) {
            return Err(ConfigError::Invalid(format!(
                "FLEET_MAX_BATCH_SIZE must be in [1, {MAX_BATCH_SIZE_LIMIT}]"
            )));
        }

        Ok(Self {
            bind_addr,
            db_path,
            run_migrations,
            allowed_origins,
            max_batch_size,
        })
    }
}

fn parse_allowed_origins(raw: Option<String>) -> Result<AllowedOrigins, ConfigError> {
    let Some(raw) = raw else {
        return Ok(AllowedOrigins::None);
    };
    if raw == "*" {
        tracing::warn!("FLEET_ALLOWED_ORIGINS=* allows cross-origin requests from any site");
        return Ok(AllowedOrigins::Any);
    }

    let mut origins = Vec::new();
    for origin in raw.split(',').map(str::trim).filter(|origin| !origin.is_empty()) {
        if origin == "*" {
            return Err(ConfigError::Invalid(
                "FLEET_ALLOWED_ORIGINS cannot mix * with explicit origins".to_string(),
            ));
        }
        if !is_http_url(origin) {
            return Err(ConfigError::Invalid(format!(
                "FLEET_ALLOWED_ORIGINS entry '{origin}' must start with http:// or https://"
            )));
        }
        let value = HeaderValue::from_str(trim_trailing(origin)).map_err(|_| {
            ConfigError::Invalid(format!(
                "FLEET_ALLOWED_ORIGINS entry '{origin}' is not a valid header value"
            ))
        })?;
        origins.push(value);
    }

    if origins.is_empty() {
        Ok(AllowedOrigins::None)
    } else {
        Ok(AllowedOrigins::List(origins))
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn trim_trailing(value: &str) -> &str {
    value.trim_end_matches('/')
}
