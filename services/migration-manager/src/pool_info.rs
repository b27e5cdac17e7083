// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Pool capacity information
//!
//! Providers report capacity and load per pool. The catalog combines the
//! latest report with what the engine itself has promised to in-flight
//! transfers, so that concurrent tasks do not all pick the same nearly
//! full pool.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tokio::sync::RwLock;

use migration_types::{PoolInfo, PoolName};

/// Pool info errors
#[derive(Debug, Error)]
pub enum PoolInfoError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Pool info service unavailable")]
    Unavailable,
}

#[async_trait]
pub trait PoolInfoProvider: Send + Sync {
    /// Capacity and load of every known pool
    async fn pools(&self) -> Result<Vec<PoolInfo>, PoolInfoError>;
}

/// Pool info kept in memory and updated by the caller
#[derive(Default)]
pub struct StaticPoolInfo {
    pools: RwLock<HashMap<PoolName, PoolInfo>>,
}

impl StaticPoolInfo {
    pub fn new(pools: Vec<PoolInfo>) -> Self {
        Self {
            pools: RwLock::new(pools.into_iter().map(|p| (p.name.clone(), p)).collect()),
        }
    }

    /// Add or replace a pool's record
    pub async fn upsert(&self, info: PoolInfo) {
        self.pools.write().await.insert(info.name.clone(), info);
    }
}

#[async_trait]
impl PoolInfoProvider for StaticPoolInfo {
    async fn pools(&self) -> Result<Vec<PoolInfo>, PoolInfoError> {
        let mut pools: Vec<_> = self.pools.read().await.values().cloned().collect();
        pools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pools)
    }
}

/// Pool info service client with caching
pub struct PoolInfoClient {
    client: Client,
    base_url: String,
    refresh_interval: Duration,
    cache: Arc<RwLock<PoolInfoCache>>,
}

/// Cached pool information
struct PoolInfoCache {
    pools: HashMap<PoolName, PoolInfo>,
    last_updated: Option<Instant>,
}

impl PoolInfoClient {
    /// Create a new pool info client
    pub fn new(
        base_url: String,
        timeout_secs: u64,
        refresh_secs: u64,
    ) -> Result<Self, PoolInfoError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            refresh_interval: Duration::from_secs(refresh_secs),
            cache: Arc::new(RwLock::new(PoolInfoCache {
                pools: HashMap::new(),
                last_updated: None,
            })),
        })
    }

    /// Refresh the cache from the pool info service
    pub async fn refresh(&self) -> Result<(), PoolInfoError> {
        let url = format!("{}/pools", self.base_url);

        let response = self.client.get(&url).send().await?;

        if !response.status().is_success() {
            tracing::warn!(
                status = %response.status(),
                "Pool info poll returned non-success status"
            );
            return Err(PoolInfoError::Unavailable);
        }

        let pools: Vec<PoolInfo> = response.json().await?;

        let mut cache = self.cache.write().await;
        cache.pools.clear();
        for pool in pools {
            cache.pools.insert(pool.name.clone(), pool);
        }
        cache.last_updated = Some(Instant::now());

        tracing::debug!(count = cache.pools.len(), "Refreshed pool info cache");

        Ok(())
    }

    async fn needs_refresh(&self) -> bool {
        let cache = self.cache.read().await;
        match cache.last_updated {
            None => true,
            Some(t) => t.elapsed() > self.refresh_interval,
        }
    }
}

#[async_trait]
impl PoolInfoProvider for PoolInfoClient {
    async fn pools(&self) -> Result<Vec<PoolInfo>, PoolInfoError> {
        if self.needs_refresh().await {
            self.refresh().await?;
        }

        let cache = self.cache.read().await;
        let mut pools: Vec<_> = cache.pools.values().cloned().collect();
        pools.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(pools)
    }
}

/// A pool as seen by target selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Latest report from the provider
    pub info: PoolInfo,
    /// Bytes promised to transfers the engine has in flight to this pool
    pub reserved_bytes: u64,
    /// Transfers the engine has in flight to this pool
    pub in_flight: u32,
}

impl Candidate {
    /// Candidate with nothing reserved
    pub fn new(info: PoolInfo) -> Self {
        Self {
            info,
            reserved_bytes: 0,
            in_flight: 0,
        }
    }

    /// Transfers reported by the pool plus those the engine has in flight
    pub fn load(&self) -> u32 {
        self.info.active_transfers.saturating_add(self.in_flight)
    }
}

#[derive(Default)]
struct PoolLoad {
    reserved_bytes: AtomicU64,
    in_flight: AtomicU32,
}

/// Engine-local space reservation on a destination pool
///
/// Released when dropped.
pub struct Reservation {
    pool: PoolName,
    bytes: u64,
    load: Arc<PoolLoad>,
}

impl Reservation {
    pub fn pool(&self) -> &str {
        &self.pool
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl std::fmt::Debug for Reservation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reservation")
            .field("pool", &self.pool)
            .field("bytes", &self.bytes)
            .finish()
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        self.load
            .reserved_bytes
            .fetch_sub(self.bytes, Ordering::SeqCst);
        self.load.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Pool info combined with engine-local reservations
pub struct PoolCatalog {
    provider: Arc<dyn PoolInfoProvider>,
    loads: RwLock<HashMap<PoolName, Arc<PoolLoad>>>,
}

impl PoolCatalog {
    pub fn new(provider: Arc<dyn PoolInfoProvider>) -> Self {
        Self {
            provider,
            loads: RwLock::new(HashMap::new()),
        }
    }

    /// Every known pool with its current reservations
    pub async fn candidates(&self) -> Result<Vec<Candidate>, PoolInfoError> {
        let pools = self.provider.pools().await?;
        let loads = self.loads.read().await;

        Ok(pools
            .into_iter()
            .map(|info| {
                let (reserved_bytes, in_flight) = match loads.get(&info.name) {
                    Some(load) => (
                        load.reserved_bytes.load(Ordering::SeqCst),
                        load.in_flight.load(Ordering::SeqCst),
                    ),
                    None => (0, 0),
                };
                Candidate {
                    info,
                    reserved_bytes,
                    in_flight,
                }
            })
            .collect())
    }

    /// Reserve space on a pool for one transfer
    pub async fn reserve(&self, pool: &str, bytes: u64) -> Reservation {
        let load = {
            let mut loads = self.loads.write().await;
            Arc::clone(loads.entry(pool.to_string()).or_default())
        };
        load.reserved_bytes.fetch_add(bytes, Ordering::SeqCst);
        load.in_flight.fetch_add(1, Ordering::SeqCst);

        Reservation {
            pool: pool.to_string(),
            bytes,
            load,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pool(name: &str, free: u64) -> PoolInfo {
        PoolInfo {
            name: name.to_string(),
            storage_group: "disk".to_string(),
            capacity_bytes: 1000,
            free_bytes: free,
            active_transfers: 0,
        }
    }

    #[tokio::test]
    async fn static_provider_sorted_by_name() {
        let provider = StaticPoolInfo::new(vec![pool("pool_c", 1), pool("pool_a", 2)]);
        provider.upsert(pool("pool_b", 3)).await;

        let names: Vec<_> = provider
            .pools()
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        assert_eq!(names, vec!["pool_a", "pool_b", "pool_c"]);
    }

    #[tokio::test]
    async fn reservations_are_released_on_drop() {
        let catalog = PoolCatalog::new(Arc::new(StaticPoolInfo::new(vec![pool("pool_b", 500)])));

        let first = catalog.reserve("pool_b", 100).await;
        let second = catalog.reserve("pool_b", 50).await;
        assert_eq!(first.pool(), "pool_b");
        assert_eq!(second.bytes(), 50);

        let candidates = catalog.candidates().await.unwrap();
        assert_eq!(candidates[0].reserved_bytes, 150);
        assert_eq!(candidates[0].in_flight, 2);

        drop(first);
        let candidates = catalog.candidates().await.unwrap();
        assert_eq!(candidates[0].reserved_bytes, 50);
        assert_eq!(candidates[0].in_flight, 1);

        drop(second);
        let candidates = catalog.candidates().await.unwrap();
        assert_eq!(candidates[0], Candidate::new(pool("pool_b", 500)));
    }

    #[test]
    fn load_adds_reported_and_engine_transfers() {
        let mut candidate = Candidate::new(PoolInfo {
            active_transfers: 3,
            ..pool("pool_b", 10)
        });
        candidate.in_flight = 2;
        assert_eq!(candidate.load(), 5);
    }
}
