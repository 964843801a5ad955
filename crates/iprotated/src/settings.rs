//! Process settings read from the environment
//!
//! ## Variables
//!
//! - `AWS_REGION`: Provider region (default `us-east-1`)
//! - `PORT`: Listening port (default `8080`)
//! - `IPROTATE_CONFIG`: Path to the instance configuration file (default `config.json`)
//! - `IPROTATE_PROVIDER`: `lightsail` (default) or `memory`
//! - `IPROTATE_POLL_INTERVAL_SECS`: Seconds between propagation reads (default 1)
//! - `IPROTATE_POLL_MAX_ATTEMPTS`: Propagation reads before giving up (default 5)
//! - `IPROTATE_LOG_LEVEL`: trace, debug, info, warn or error (default `info`)
//!
//! Provider credentials are not read here; `aws-config` resolves them.

use anyhow::{Context, Result};
use iprotate_core::PropagationPolicy;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_REGION: &str = "us-east-1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Which CloudProviderClient backs the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// AWS Lightsail
    Lightsail,
    /// In-memory model seeded from the configuration (local dry runs)
    Memory,
}

impl ProviderKind {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "lightsail" => Ok(ProviderKind::Lightsail),
            "memory" => Ok(ProviderKind::Memory),
            other => anyhow::bail!(
                "IPROTATE_PROVIDER '{}' is not supported. \
                Supported providers: lightsail, memory",
                other
            ),
        }
    }
}

/// Application settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub region: String,
    pub port: u16,
    pub config_path: PathBuf,
    pub provider: ProviderKind,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: usize,
    pub log_level: String,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load settings through an arbitrary key lookup
    ///
    /// Unset or empty values fall back to their defaults; values that are
    /// set but do not parse are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            region: get("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
            port: match get("PORT") {
                Some(port) => port
                    .trim()
                    .parse()
                    .with_context(|| format!("PORT must be a port number. Got: {}", port))?,
                None => DEFAULT_PORT,
            },
            config_path: get("IPROTATE_CONFIG")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH)),
            provider: match get("IPROTATE_PROVIDER") {
                Some(kind) => ProviderKind::parse(&kind)?,
                None => ProviderKind::Lightsail,
            },
            poll_interval_secs: match get("IPROTATE_POLL_INTERVAL_SECS") {
                Some(secs) => secs.trim().parse().with_context(|| {
                    format!("IPROTATE_POLL_INTERVAL_SECS must be a number. Got: {}", secs)
                })?,
                None => 1,
            },
            poll_max_attempts: match get("IPROTATE_POLL_MAX_ATTEMPTS") {
                Some(attempts) => attempts.trim().parse().with_context(|| {
                    format!("IPROTATE_POLL_MAX_ATTEMPTS must be a number. Got: {}", attempts)
                })?,
                None => 5,
            },
            log_level: get("IPROTATE_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        })
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("PORT must be between 1 and 65535. Got: 0");
        }

        if !(1..=60).contains(&self.poll_interval_secs) {
            anyhow::bail!(
                "IPROTATE_POLL_INTERVAL_SECS must be between 1 and 60 seconds. Got: {}",
                self.poll_interval_secs
            );
        }

        if !(1..=60).contains(&self.poll_max_attempts) {
            anyhow::bail!(
                "IPROTATE_POLL_MAX_ATTEMPTS must be between 1 and 60. Got: {}",
                self.poll_max_attempts
            );
        }

        if self.tracing_level().is_none() {
            anyhow::bail!(
                "IPROTATE_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            );
        }

        Ok(())
    }

    /// Tracing level for `log_level`, if valid
    pub fn tracing_level(&self) -> Option<Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Some(Level::TRACE),
            "debug" => Some(Level::DEBUG),
            "info" => Some(Level::INFO),
            "warn" => Some(Level::WARN),
            "error" => Some(Level::ERROR),
            _ => None,
        }
    }

    /// Propagation polling policy for the orchestrator
    pub fn propagation_policy(&self) -> PropagationPolicy {
        PropagationPolicy::new(
            Duration::from_secs(self.poll_interval_secs),
            self.poll_max_attempts,
        )
    }

    /// Address to bind the HTTP listener to
    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn settings(vars: &[(&str, &str)]) -> Result<Settings> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Settings::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings.region, "us-east-1");
        assert_eq!(settings.port, 8080);
        assert_eq!(settings.config_path, PathBuf::from("config.json"));
        assert_eq!(settings.provider, ProviderKind::Lightsail);
        assert_eq!(settings.propagation_policy().max_wait(), Duration::from_secs(5));
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_empty_values_fall_back() {
        let settings = settings(&[("AWS_REGION", ""), ("PORT", " ")]).unwrap();
        assert_eq!(settings.region, DEFAULT_REGION);
        assert_eq!(settings.port, DEFAULT_PORT);
    }

    #[test]
    fn test_overrides() {
        let settings = settings(&[
            ("AWS_REGION", "ap-northeast-1"),
            ("PORT", "9000"),
            ("IPROTATE_PROVIDER", "Memory"),
            ("IPROTATE_POLL_INTERVAL_SECS", "2"),
            ("IPROTATE_POLL_MAX_ATTEMPTS", "3"),
            ("IPROTATE_LOG_LEVEL", "DEBUG"),
        ])
        .unwrap();

        assert_eq!(settings.listen_addr().port(), 9000);
        assert_eq!(settings.provider, ProviderKind::Memory);
        assert_eq!(settings.propagation_policy().max_wait(), Duration::from_secs(6));
        assert_eq!(settings.tracing_level(), Some(Level::DEBUG));
    }

    #[test]
    fn test_unparseable_port_is_error() {
        let err = settings(&[("PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_unknown_provider_is_error() {
        assert!(settings(&[("IPROTATE_PROVIDER", "gcp")]).is_err());
    }

    #[test]
    fn test_validate_ranges() {
        let mut settings = settings(&[]).unwrap();
        settings.poll_max_attempts = 0;
        assert!(settings.validate().is_err());

        settings.poll_max_attempts = 5;
        settings.log_level = "verbose".to_string();
        assert!(settings.validate().is_err());
    }
}
