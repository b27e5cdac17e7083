// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Location service interface
//!
//! The location service is the authoritative record of which pools hold
//! which replicas. The engine queries it for replicas to migrate and
//! updates it once a replica has landed on its destination.

use std::collections::BTreeMap;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use thiserror::Error;
use tokio::sync::RwLock;

use migration_types::{PoolName, ReplicaDescriptor, ReplicaId, SelectionCriterion};

/// Location service errors
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Criterion not supported: {0}")]
    UnsupportedCriterion(String),

    #[error("Location service unavailable: {0}")]
    Unavailable(String),

    #[error("Replica not found: {0}")]
    NotFound(ReplicaId),

    #[error("Location update rejected: {0}")]
    Rejected(String),
}

impl LocationError {
    /// Whether retrying the same request may succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, LocationError::Unavailable(_))
    }
}

/// Lazy sequence of replicas matching a criterion
pub type ReplicaStream = BoxStream<'static, Result<ReplicaDescriptor, LocationError>>;

#[async_trait]
pub trait LocationService: Send + Sync {
    /// Record `pool` as holding a replica of `replica_id`
    async fn add_location(&self, replica_id: &str, pool: &str) -> Result<(), LocationError>;

    /// Forget that `pool` holds a replica of `replica_id`
    async fn remove_location(&self, replica_id: &str, pool: &str) -> Result<(), LocationError>;

    /// Start enumerating replicas matching `criterion`
    ///
    /// Each call starts a fresh enumeration.
    async fn query(&self, criterion: &SelectionCriterion) -> Result<ReplicaStream, LocationError>;
}

/// Location service kept in process memory
///
/// Queries enumerate a snapshot taken when the query starts, in replica id
/// order.
#[derive(Default)]
pub struct MemoryLocationService {
    replicas: RwLock<BTreeMap<ReplicaId, ReplicaDescriptor>>,
}

impl MemoryLocationService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a replica record
    pub async fn insert(&self, replica: ReplicaDescriptor) {
        self.replicas
            .write()
            .await
            .insert(replica.id.clone(), replica);
    }

    /// Current record of a replica
    pub async fn get(&self, replica_id: &str) -> Option<ReplicaDescriptor> {
        self.replicas.read().await.get(replica_id).cloned()
    }

    /// Pools currently recorded for a replica
    pub async fn locations(&self, replica_id: &str) -> Vec<PoolName> {
        self.get(replica_id)
            .await
            .map(|r| r.locations)
            .unwrap_or_default()
    }
}

#[async_trait]
impl LocationService for MemoryLocationService {
    async fn add_location(&self, replica_id: &str, pool: &str) -> Result<(), LocationError> {
        let mut replicas = self.replicas.write().await;
        let replica = replicas
            .get_mut(replica_id)
            .ok_or_else(|| LocationError::NotFound(replica_id.to_string()))?;
        if !replica.is_on(pool) {
            replica.locations.push(pool.to_string());
        }
        Ok(())
    }

    async fn remove_location(&self, replica_id: &str, pool: &str) -> Result<(), LocationError> {
        let mut replicas = self.replicas.write().await;
        let replica = replicas
            .get_mut(replica_id)
            .ok_or_else(|| LocationError::NotFound(replica_id.to_string()))?;
        replica.locations.retain(|p| p != pool);
        Ok(())
    }

    async fn query(&self, criterion: &SelectionCriterion) -> Result<ReplicaStream, LocationError> {
        let matching: Vec<_> = self
            .replicas
            .read()
            .await
            .values()
            .filter(|r| criterion.matches(r))
            .cloned()
            .map(Ok)
            .collect();
        Ok(stream::iter(matching).boxed())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn replica(id: &str, locations: &[&str]) -> ReplicaDescriptor {
        ReplicaDescriptor {
            id: id.to_string(),
            size_bytes: 10,
            checksum: String::new(),
            locations: locations.iter().map(|s| s.to_string()).collect(),
            storage_group: String::new(),
        }
    }

    #[test]
    fn only_unavailable_is_transient() {
        assert!(LocationError::Unavailable("down".into()).is_transient());
        assert!(!LocationError::NotFound("r".into()).is_transient());
        assert!(!LocationError::Rejected("no".into()).is_transient());
        assert!(!LocationError::UnsupportedCriterion("x".into()).is_transient());
    }

    #[tokio::test]
    async fn add_and_remove_location() {
        let service = MemoryLocationService::new();
        service.insert(replica("r1", &["pool_a"])).await;

        service.add_location("r1", "pool_b").await.unwrap();
        service.add_location("r1", "pool_b").await.unwrap();
        assert_eq!(service.locations("r1").await, vec!["pool_a", "pool_b"]);

        service.remove_location("r1", "pool_a").await.unwrap();
        assert_eq!(service.locations("r1").await, vec!["pool_b"]);

        assert_eq!(
            service.add_location("r2", "pool_b").await.unwrap_err(),
            LocationError::NotFound("r2".to_string())
        );
    }

    #[tokio::test]
    async fn query_filters_by_criterion() {
        let service = MemoryLocationService::new();
        service.insert(replica("r1", &["pool_a"])).await;
        service.insert(replica("r2", &["pool_a", "pool_b"])).await;
        service.insert(replica("r3", &["pool_b"])).await;

        let ids: Vec<_> = service
            .query(&SelectionCriterion::OnPool("pool_a".into()))
            .await
            .unwrap()
            .map(|r| r.unwrap().id)
            .collect()
            .await;

        assert_eq!(ids, vec!["r1", "r2"]);
    }
}
