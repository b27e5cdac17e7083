// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Target selection policies
//!
//! A policy picks the destination pool for one replica. Every variant
//! skips:
//! 1. The source pool
//! 2. Pools already holding the replica
//! 3. Pools excluded by earlier refusals
//! 4. Pools in excluded storage groups
//! 5. Pools without room for the replica once the fill limit and engine
//!    reservations are taken into account

use std::cmp::Reverse;
use std::sync::Arc;

use migration_types::{PolicyKind, PoolName, ReplicaDescriptor};

use crate::pool_info::Candidate;

/// Everything a policy may look at for one decision
#[derive(Debug, Clone, Copy)]
pub struct SelectionRequest<'a> {
    /// Pool the replica is copied from
    pub source: &'a str,
    /// Replica to place
    pub replica: &'a ReplicaDescriptor,
    /// Pools that already refused this replica
    pub excluded: &'a [PoolName],
    /// Known pools with their current load
    pub candidates: &'a [Candidate],
}

pub trait TargetSelectionPolicy: Send + Sync {
    /// Choose a destination, or `None` when no pool is eligible
    fn select_target(&self, request: &SelectionRequest<'_>) -> Option<PoolName>;

    /// Policy name for logging
    fn name(&self) -> &'static str;
}

/// Limits shared by all policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionLimits {
    /// Pools are not filled beyond this percentage (0-100)
    pub max_fill_percentage: u32,
    /// Storage groups never used as destinations
    pub excluded_storage_groups: Vec<String>,
}

impl Default for SelectionLimits {
    fn default() -> Self {
        Self {
            max_fill_percentage: 90,
            excluded_storage_groups: Vec::new(),
        }
    }
}

/// Bytes a transfer may still take on a pool
///
/// Honors the fill limit and subtracts what the engine has already
/// promised to in-flight transfers.
pub fn effective_free_bytes(candidate: &Candidate, max_fill_percentage: u32) -> u64 {
    let info = &candidate.info;

    // If the pool is already at the fill limit, no space available
    if info.percent_used() >= max_fill_percentage {
        return 0;
    }

    let capacity = info.capacity_bytes as u128;
    let max_fill_bytes = capacity * max_fill_percentage.min(100) as u128 / 100;
    let used = capacity.saturating_sub(info.free_bytes as u128);

    // Maximum remaining we can use, never more than what is actually free
    let max_remaining = (max_fill_bytes.saturating_sub(used) as u64).min(info.free_bytes);

    max_remaining.saturating_sub(candidate.reserved_bytes)
}

impl SelectionLimits {
    fn eligible(&self, request: &SelectionRequest<'_>, candidate: &Candidate) -> bool {
        let name = candidate.info.name.as_str();

        if name == request.source {
            return false;
        }
        if request.replica.is_on(name) {
            return false;
        }
        if request.excluded.iter().any(|p| p == name) {
            return false;
        }
        if self
            .excluded_storage_groups
            .iter()
            .any(|g| *g == candidate.info.storage_group)
        {
            return false;
        }

        effective_free_bytes(candidate, self.max_fill_percentage) >= request.replica.size_bytes
    }
}

/// Built-in policy: any pool with room, least loaded first
///
/// Ties are broken by lowest fill, then most free space, then name.
#[derive(Debug, Clone, Default)]
pub struct LeastLoaded {
    limits: SelectionLimits,
}

impl LeastLoaded {
    pub fn new(limits: SelectionLimits) -> Self {
        Self { limits }
    }

    fn select_where<F>(&self, request: &SelectionRequest<'_>, mut filter: F) -> Option<PoolName>
    where
        F: FnMut(&Candidate) -> bool,
    {
        request
            .candidates
            .iter()
            .filter(|c| filter(c) && self.limits.eligible(request, c))
            .min_by_key(|&c| {
                (
                    c.load(),
                    c.info.percent_used(),
                    Reverse(effective_free_bytes(c, self.limits.max_fill_percentage)),
                    c.info.name.as_str(),
                )
            })
            .map(|c| c.info.name.clone())
    }
}

impl TargetSelectionPolicy for LeastLoaded {
    fn select_target(&self, request: &SelectionRequest<'_>) -> Option<PoolName> {
        self.select_where(request, |_| true)
    }

    fn name(&self) -> &'static str {
        "least_loaded"
    }
}

/// Like `LeastLoaded`, restricted to the source pool's storage group
///
/// When the source pool is not among the candidates, the replica's own
/// storage group is used.
#[derive(Debug, Clone, Default)]
pub struct SameStorageGroup {
    inner: LeastLoaded,
}

impl SameStorageGroup {
    pub fn new(limits: SelectionLimits) -> Self {
        Self {
            inner: LeastLoaded::new(limits),
        }
    }
}

impl TargetSelectionPolicy for SameStorageGroup {
    fn select_target(&self, request: &SelectionRequest<'_>) -> Option<PoolName> {
        let group = request
            .candidates
            .iter()
            .find(|c| c.info.name == request.source)
            .map(|c| c.info.storage_group.as_str())
            .unwrap_or(request.replica.storage_group.as_str());

        self.inner
            .select_where(request, |c| c.info.storage_group == group)
    }

    fn name(&self) -> &'static str {
        "same_storage_group"
    }
}

/// Only the listed pools, first eligible one wins
#[derive(Debug, Clone)]
pub struct PoolList {
    pools: Vec<PoolName>,
    limits: SelectionLimits,
}

impl PoolList {
    pub fn new(pools: Vec<PoolName>, limits: SelectionLimits) -> Self {
        Self { pools, limits }
    }
}

impl TargetSelectionPolicy for PoolList {
    fn select_target(&self, request: &SelectionRequest<'_>) -> Option<PoolName> {
        self.pools.iter().find_map(|name| {
            request
                .candidates
                .iter()
                .find(|c| c.info.name == *name)
                .filter(|c| self.limits.eligible(request, c))
                .map(|c| c.info.name.clone())
        })
    }

    fn name(&self) -> &'static str {
        "pool_list"
    }
}

/// Build the policy named by a job payload
pub fn build_policy(kind: &PolicyKind, limits: SelectionLimits) -> Arc<dyn TargetSelectionPolicy> {
    match kind {
        PolicyKind::LeastLoaded => Arc::new(LeastLoaded::new(limits)),
        PolicyKind::SameStorageGroup => Arc::new(SameStorageGroup::new(limits)),
        PolicyKind::PoolList(pools) => Arc::new(PoolList::new(pools.clone(), limits)),
    }
}
