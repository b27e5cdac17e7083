// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Pool configuration

use std::path::PathBuf;

/// Default data directory for replica files
const DEFAULT_DATA_DIR: &str = "/var/lib/pool";

/// Space added to a transfer's allocation each time a write overruns it
pub const DEFAULT_ALLOCATION_INCREMENT_BYTES: u64 = 50 * 1024 * 1024;

/// Pool configuration
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Name of this pool
    pub pool_name: String,
    /// Directory holding replica data files
    pub data_dir: PathBuf,
    /// Total capacity in bytes
    pub capacity_bytes: u64,
    /// Bytes already used when the process started
    pub used_bytes: u64,
    /// Allocation growth step for incoming writes
    pub allocation_increment_bytes: u64,
    /// Whether the pool takes new transfers
    pub accepting: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            pool_name: String::new(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            capacity_bytes: 0,
            used_bytes: 0,
            allocation_increment_bytes: DEFAULT_ALLOCATION_INCREMENT_BYTES,
            accepting: true,
        }
    }
}

impl PoolConfig {
    /// Create a configuration for a named pool with the given capacity
    pub fn new(pool_name: impl Into<String>, capacity_bytes: u64) -> Self {
        Self {
            pool_name: pool_name.into(),
            capacity_bytes,
            ..Default::default()
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let pool_name = std::env::var("POOL_NAME").unwrap_or_default();

        let data_dir = std::env::var("POOL_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.data_dir);

        let capacity_bytes = std::env::var("POOL_CAPACITY_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.capacity_bytes);

        let used_bytes = std::env::var("POOL_USED_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.used_bytes);

        let allocation_increment_bytes = std::env::var("POOL_ALLOCATION_INCREMENT_BYTES")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n: &u64| *n > 0)
            .unwrap_or(defaults.allocation_increment_bytes);

        // Anything but an explicit "false"/"0"/"no" keeps the pool open
        let accepting = std::env::var("POOL_ACCEPTING")
            .map(|v| !matches!(v.to_lowercase().as_str(), "false" | "0" | "no"))
            .unwrap_or(true);

        Self {
            pool_name,
            data_dir,
            capacity_bytes,
            used_bytes,
            allocation_increment_bytes,
            accepting,
        }
    }

    /// Path a replica's data file is written to
    pub fn replica_path(&self, replica_id: &str) -> PathBuf {
        self.data_dir.join("data").join(replica_id)
    }
}
