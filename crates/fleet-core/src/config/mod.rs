//! Sync client configuration.
//!
//! Values come from the environment (`FLEET_SERVER_URL`,
//! `FLEET_PROBE_INTERVAL_SECS`) and can be overridden by command line flags.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::util::{is_http_url, normalize_text_option};

const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
const MIN_PROBE_INTERVAL_SECS: u64 = 1;
const MAX_PROBE_INTERVAL_SECS: u64 = 3_600;

/// Where the client syncs to and how often it checks connectivity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncClientConfig {
    /// Base URL of the fleet API, if configured
    pub server_url: Option<String>,
    pub probe_interval: Duration,
}

impl Default for SyncClientConfig {
    fn default() -> Self {
        Self {
            server_url: None,
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
        }
    }
}

impl SyncClientConfig {
    pub fn from_env() -> Result<Self, String> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, String> {
        let server_url = normalize_server_url(lookup("FLEET_SERVER_URL"))?;

        let probe_interval = match normalize_text_option(lookup("FLEET_PROBE_INTERVAL_SECS")) {
            Some(raw) => parse_probe_interval(&raw)?,
            None => Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
        };

        Ok(Self {
            server_url,
            probe_interval,
        })
    }

    /// Replace the server URL, e.g. from a `--server` flag
    pub fn with_server_url(mut self, server_url: Option<String>) -> Result<Self, String> {
        if let Some(url) = normalize_server_url(server_url)? {
            self.server_url = Some(url);
        }
        Ok(self)
    }
}

/// Trim, drop empties, strip trailing slashes and require an HTTP scheme
pub fn normalize_server_url(raw: Option<String>) -> Result<Option<String>, String> {
    let Some(url) = normalize_text_option(raw) else {
        return Ok(None);
    };
    if !is_http_url(&url) {
        return Err(format!("server URL '{url}' must include http:// or https://"));
    }
    Ok(Some(url.trim_end_matches('/').to_string()))
}

fn parse_probe_interval(raw: &str) -> Result<Duration, String> {
    let secs = raw.parse::<u64>().map_err(|_| {
        format!(
            "FLEET_PROBE_INTERVAL_SECS must be an integer in [{MIN_PROBE_INTERVAL_SECS}, {MAX_PROBE_INTERVAL_SECS}]"
        )
    })?;
    if !(MIN_PROBE_INTERVAL_SECS..=MAX_PROBE_INTERVAL_SECS).contains(&secs) {
        return Err(format!(
            "FLEET_PROBE_INTERVAL_SECS must be in [{MIN_PROBE_INTERVAL_SECS}, {MAX_PROBE_INTERVAL_SECS}]"
        ));
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_without_environment() {
        let config = SyncClientConfig::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config, SyncClientConfig::default());
    }

    #[test]
    fn server_url_is_normalized() {
        let config = SyncClientConfig::from_lookup(lookup_from(&[(
            "FLEET_SERVER_URL",
            " https://fleet.example.com/ ",
        )]))
        .unwrap();
        assert_eq!(
            config.server_url.as_deref(),
            Some("https://fleet.example.com")
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(
            SyncClientConfig::from_lookup(lookup_from(&[("FLEET_SERVER_URL", "fleet.example.com")]))
                .is_err()
        );
        assert!(SyncClientConfig::from_lookup(lookup_from(&[(
            "FLEET_PROBE_INTERVAL_SECS",
            "0"
        )]))
        .is_err());
        assert!(SyncClientConfig::from_lookup(lookup_from(&[(
            "FLEET_PROBE_INTERVAL_SECS",
            "soon"
        )]))
        .is_err());
    }

    #[test]
    fn flag_overrides_environment() {
        let config = SyncClientConfig::from_lookup(lookup_from(&[(
            "FLEET_SERVER_URL",
            "https://env.example.com",
        )]))
        .unwrap()
        .with_server_url(Some("http://localhost:8080".to_string()))
        .unwrap();
        assert_eq!(config.server_url.as_deref(), Some("http://localhost:8080"));
    }
}
