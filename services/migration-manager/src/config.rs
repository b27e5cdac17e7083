// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Configuration for the migration engine

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Deserialize;

use migration_types::MAX_JOB_CONCURRENCY;

use crate::backoff::Backoff;

/// Engine configuration loaded from environment variables or JSON file
///
/// Configuration can be loaded from:
/// 1. Environment variables (primary method, see `from_env()`)
/// 2. JSON config file (for runtime reloading, see `from_file()`)
///
/// Values changed by a reload only apply to jobs submitted afterwards.
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    /// Pool info service URL
    /// Note: This field is NOT reloadable - changes require restart
    #[serde(skip)]
    pub pool_info_url: Option<String>,

    /// Concurrency limit for jobs that do not name one
    pub default_concurrency: u32,

    /// Transfer attempts per task before it fails
    pub max_attempts: u32,

    /// Interval between liveness pings
    pub ping_interval_ms: u64,

    /// Liveness timeout as a multiple of the ping interval
    pub liveness_timeout_multiplier: u32,

    /// Location update attempts before a task fails confirmation
    pub confirm_max_attempts: u32,

    /// First delay between location update attempts
    pub confirm_backoff_base_ms: u64,

    /// Upper bound on the delay between location update attempts
    pub confirm_backoff_max_ms: u64,

    /// Destination pools are not filled beyond this percentage (0-100)
    pub max_fill_percentage: u32,

    /// Storage groups never used as destinations
    ///
    /// Parsed from MIGRATION_EXCLUDED_STORAGE_GROUPS (comma-separated list).
    pub excluded_storage_groups: Vec<String>,

    /// How long pool info responses are cached
    pub pool_info_refresh_secs: u64,

    /// HTTP client timeout in seconds
    /// Note: This field is NOT reloadable - changes require restart
    pub http_timeout_secs: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            pool_info_url: None,
            default_concurrency: 10,
            max_attempts: 3,
            ping_interval_ms: 10_000,
            liveness_timeout_multiplier: 3,
            confirm_max_attempts: 5,
            confirm_backoff_base_ms: 500,
            confirm_backoff_max_ms: 30_000,
            max_fill_percentage: 90,
            excluded_storage_groups: Vec::new(),
            pool_info_refresh_secs: 30,
            http_timeout_secs: 30,
        }
    }
}

/// Parse an environment variable, falling back to a default when unset
fn env_or<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(name) {
        Ok(v) => v
            .trim()
            .parse()
            .with_context(|| format!("Invalid {}", name)),
        Err(_) => Ok(default),
    }
}

impl EngineConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let pool_info_url = std::env::var("MIGRATION_POOL_INFO_URL")
            .ok()
            .filter(|s| !s.is_empty());

        // Example: "tape,archive" -> vec!["tape", "archive"]
        let excluded_storage_groups = std::env::var("MIGRATION_EXCLUDED_STORAGE_GROUPS")
            .map(|v| {
                v.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let config = Self {
            pool_info_url,
            default_concurrency: env_or(
                "MIGRATION_DEFAULT_CONCURRENCY",
                defaults.default_concurrency,
            )?,
            max_attempts: env_or("MIGRATION_MAX_ATTEMPTS", defaults.max_attempts)?,
            ping_interval_ms: env_or("MIGRATION_PING_INTERVAL_MS", defaults.ping_interval_ms)?,
            liveness_timeout_multiplier: env_or(
                "MIGRATION_LIVENESS_TIMEOUT_MULTIPLIER",
                defaults.liveness_timeout_multiplier,
            )?,
            confirm_max_attempts: env_or(
                "MIGRATION_CONFIRM_MAX_ATTEMPTS",
                defaults.confirm_max_attempts,
            )?,
            confirm_backoff_base_ms: env_or(
                "MIGRATION_CONFIRM_BACKOFF_BASE_MS",
                defaults.confirm_backoff_base_ms,
            )?,
            confirm_backoff_max_ms: env_or(
                "MIGRATION_CONFIRM_BACKOFF_MAX_MS",
                defaults.confirm_backoff_max_ms,
            )?,
            max_fill_percentage: env_or(
                "MIGRATION_MAX_FILL_PERCENTAGE",
                defaults.max_fill_percentage,
            )?,
            excluded_storage_groups,
            pool_info_refresh_secs: env_or(
                "MIGRATION_POOL_INFO_REFRESH_SECS",
                defaults.pool_info_refresh_secs,
            )?,
            http_timeout_secs: env_or("MIGRATION_HTTP_TIMEOUT_SECS", defaults.http_timeout_secs)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a JSON file
    ///
    /// Fields missing from the file take their default values; the pool
    /// info URL is never read from the file.
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config
            .validate()
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        Ok(config)
    }

    /// Merge runtime-reloadable fields from another config
    ///
    /// The pool info client is built once, so its URL, timeout and refresh
    /// interval are kept. Running jobs keep the settings they started with.
    pub fn merge_reloadable(&mut self, other: &EngineConfig) {
        self.default_concurrency = other.default_concurrency;
        self.max_attempts = other.max_attempts;
        self.ping_interval_ms = other.ping_interval_ms;
        self.liveness_timeout_multiplier = other.liveness_timeout_multiplier;
        self.confirm_max_attempts = other.confirm_max_attempts;
        self.confirm_backoff_base_ms = other.confirm_backoff_base_ms;
        self.confirm_backoff_max_ms = other.confirm_backoff_max_ms;
        self.max_fill_percentage = other.max_fill_percentage;
        self.excluded_storage_groups = other.excluded_storage_groups.clone();
    }

    /// Check that the limits are usable
    pub fn validate(&self) -> Result<()> {
        if self.default_concurrency == 0 || self.default_concurrency > MAX_JOB_CONCURRENCY {
            bail!(
                "default_concurrency must be between 1 and {}",
                MAX_JOB_CONCURRENCY
            );
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be > 0");
        }
        if self.ping_interval_ms == 0 {
            bail!("ping_interval_ms must be > 0");
        }
        // A single lost pong must not fail a transfer
        if self.liveness_timeout_multiplier < 2 {
            bail!("liveness_timeout_multiplier must be >= 2");
        }
        if self
            .ping_interval()
            .checked_mul(self.liveness_timeout_multiplier)
            .is_none()
        {
            bail!("ping_interval_ms * liveness_timeout_multiplier is out of range");
        }
        if self.confirm_max_attempts == 0 {
            bail!("confirm_max_attempts must be > 0");
        }
        if self.confirm_backoff_max_ms < self.confirm_backoff_base_ms {
            bail!("confirm_backoff_max_ms must be >= confirm_backoff_base_ms");
        }
        if self.max_fill_percentage == 0 || self.max_fill_percentage > 100 {
            bail!("max_fill_percentage must be between 1 and 100");
        }
        Ok(())
    }

    /// Interval between liveness pings
    pub fn ping_interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval_ms)
    }

    /// Time without a pong after which a transfer is declared dead
    pub fn liveness_timeout(&self) -> Duration {
        self.ping_interval()
            .checked_mul(self.liveness_timeout_multiplier)
            .unwrap_or(Duration::MAX)
    }

    /// Backoff schedule for location updates
    pub fn confirm_backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.confirm_backoff_base_ms),
            Duration::from_millis(self.confirm_backoff_max_ms),
            self.confirm_max_attempts,
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Write;

    // Note: `from_env()` is not tested directly; `std::env::set_var` is
    // unsafe in edition 2024 and tests run on several threads.

    #[test]
    fn defaults_are_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.liveness_timeout(), Duration::from_secs(30));
        assert_eq!(config.confirm_backoff().max_attempts(), 5);
    }

    #[test]
    fn liveness_timeout_saturates() {
        let config = EngineConfig {
            ping_interval_ms: u64::MAX,
            liveness_timeout_multiplier: u32::MAX,
            ..Default::default()
        };
        assert_eq!(config.liveness_timeout(), Duration::MAX);
        assert_eq!(
            EngineConfig::default().liveness_timeout(),
            Duration::from_secs(30)
        );
    }

    #[test]
    fn validate_rejects_bad_limits() {
        let bad = [
            EngineConfig {
                default_concurrency: 0,
                ..Default::default()
            },
            EngineConfig {
                max_attempts: 0,
                ..Default::default()
            },
            EngineConfig {
                ping_interval_ms: 0,
                ..Default::default()
            },
            EngineConfig {
                liveness_timeout_multiplier: 1,
                ..Default::default()
            },
            EngineConfig {
                confirm_max_attempts: 0,
                ..Default::default()
            },
            EngineConfig {
                confirm_backoff_base_ms: 1000,
                confirm_backoff_max_ms: 10,
                ..Default::default()
            },
            EngineConfig {
                max_fill_percentage: 101,
                ..Default::default()
            },
            EngineConfig {
                ping_interval_ms: u64::MAX,
                liveness_timeout_multiplier: u32::MAX,
                ..Default::default()
            },
        ];

        for config in bad {
            assert!(config.validate().is_err(), "accepted {:?}", config);
        }
    }

    #[test]
    fn merge_reloadable_preserves_connection_settings() {
        let mut original = EngineConfig {
            pool_info_url: Some("http://pools.local".to_string()),
            http_timeout_secs: 10,
            ..Default::default()
        };

        let new_config = EngineConfig {
            pool_info_url: Some("http://elsewhere".to_string()),
            http_timeout_secs: 99,
            max_attempts: 7,
            max_fill_percentage: 80,
            excluded_storage_groups: vec!["tape".to_string()],
            ..Default::default()
        };

        original.merge_reloadable(&new_config);

        assert_eq!(original.pool_info_url.as_deref(), Some("http://pools.local"));
        assert_eq!(original.http_timeout_secs, 10);
        assert_eq!(original.max_attempts, 7);
        assert_eq!(original.max_fill_percentage, 80);
        assert_eq!(original.excluded_storage_groups, vec!["tape".to_string()]);
    }

    #[tokio::test]
    async fn from_file_fills_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"max_attempts": 4, "excluded_storage_groups": ["tape"]}}"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).await.unwrap();

        assert_eq!(config.max_attempts, 4);
        assert_eq!(config.excluded_storage_groups, vec!["tape".to_string()]);
        assert_eq!(config.default_concurrency, 10);
        assert_eq!(config.pool_info_url, None);
    }

    #[tokio::test]
    async fn from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"liveness_timeout_multiplier": 1}}"#).unwrap();

        assert!(EngineConfig::from_file(file.path()).await.is_err());
    }

    #[tokio::test]
    async fn from_file_missing_file() {
        let err = EngineConfig::from_file(Path::new("/nonexistent/engine.json"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
