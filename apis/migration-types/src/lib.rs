// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Shared types for pool movers and the replica migration manager.
//!
//! This crate contains the common data structures used by both the pool
//! side (which registers transfers and answers liveness pings) and the
//! migration manager (which drives replica migration jobs across pools).

use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString, VariantNames};
use uuid::Uuid;

// ============================================================================
// Type Aliases
// ============================================================================

/// Pool identifier (cell name of the pool process)
pub type PoolName = String;

/// Replica identifier (immutable file identity)
pub type ReplicaId = String;

/// Identifier of one transfer attempt, matched by pings, pongs and mover
/// callbacks
pub type CorrelationId = Uuid;

/// Job identifier
pub type JobId = Uuid;

/// Upper bound accepted for a job's concurrency limit
pub const MAX_JOB_CONCURRENCY: u32 = 1000;

// ============================================================================
// Pool Types
// ============================================================================

/// A stored file whose replicas may be migrated.
///
/// The engine treats the identity, size and checksum as opaque; only the
/// location list and storage group are interpreted (by criteria and
/// selection policies).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ReplicaDescriptor {
    /// File identity
    pub id: ReplicaId,
    /// Size of the replica in bytes
    pub size_bytes: u64,
    /// Checksum of the file data
    pub checksum: String,
    /// Pools currently recorded as holding a replica of this file
    #[serde(default)]
    pub locations: Vec<PoolName>,
    /// Storage group the file belongs to
    #[serde(default)]
    pub storage_group: String,
}

impl ReplicaDescriptor {
    /// Whether a replica is recorded on the given pool
    pub fn is_on(&self, pool: &str) -> bool {
        self.locations.iter().any(|p| p == pool)
    }

    /// Number of recorded replicas
    pub fn replica_count(&self) -> usize {
        self.locations.len()
    }
}

/// Capacity and load of a pool as reported by the pool info service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PoolInfo {
    /// Pool name
    pub name: PoolName,
    /// Storage group the pool serves
    #[serde(default)]
    pub storage_group: String,
    /// Total capacity in bytes
    pub capacity_bytes: u64,
    /// Free space in bytes
    pub free_bytes: u64,
    /// Transfers the pool currently has in flight
    #[serde(default)]
    pub active_transfers: u32,
}

impl PoolInfo {
    /// Percentage of capacity in use, rounded down (100 for a pool with no
    /// capacity)
    pub fn percent_used(&self) -> u32 {
        if self.capacity_bytes == 0 {
            return 100;
        }
        let used = self.capacity_bytes.saturating_sub(self.free_bytes);
        ((used as u128 * 100) / self.capacity_bytes as u128) as u32
    }
}

/// Which end of a transfer a pool plays.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TransferRole {
    /// Pool sends the replica data
    Source,
    /// Pool receives and stores the replica data
    Destination,
}

/// Request sent to a pool's mover layer to start one side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransferRequest {
    /// Correlation id of this attempt
    pub correlation_id: CorrelationId,
    /// Replica being transferred
    pub replica: ReplicaDescriptor,
    /// Role of the pool receiving this request
    pub role: TransferRole,
    /// The pool at the other end of the transfer
    pub peer: PoolName,
}

/// Reasons a mover layer refuses to start a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "detail", rename_all = "snake_case")]
pub enum TransferRefusal {
    /// The pool is disabled or draining and takes no new transfers
    NotAccepting,
    /// Not enough free space for the replica
    InsufficientSpace {
        /// Bytes the transfer needs
        needed: u64,
        /// Bytes the pool can still give out
        available: u64,
    },
    /// A transfer with the same correlation id is already registered
    Duplicate,
    /// The pool could not be reached
    Unreachable(String),
}

impl fmt::Display for TransferRefusal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAccepting => write!(f, "pool is not accepting transfers"),
            Self::InsufficientSpace { needed, available } => write!(
                f,
                "insufficient space: need {} bytes, {} available",
                needed, available
            ),
            Self::Duplicate => write!(f, "duplicate correlation id"),
            Self::Unreachable(msg) => write!(f, "pool unreachable: {}", msg),
        }
    }
}

/// Outcome reported by a pool's mover for one side of a transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransferEventKind {
    /// The mover finished; the data is on stable storage for its side
    Completed {
        /// Bytes moved by this side
        bytes_transferred: u64,
    },
    /// The mover hit an I/O error
    Failed {
        /// Description of the failure
        cause: String,
    },
}

/// Mover callback published by a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TransferEvent {
    /// Correlation id of the transfer attempt
    pub correlation_id: CorrelationId,
    /// Pool that reported the event
    pub pool: PoolName,
    /// Role of the reporting pool
    pub role: TransferRole,
    /// What happened
    pub kind: TransferEventKind,
}

// ============================================================================
// Liveness Messages
// ============================================================================

/// Body shared by liveness pings and pongs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct PoolMigrationMessage {
    /// Correlation id of the transfer being checked
    pub correlation_id: CorrelationId,
    /// Pool on whose behalf the transfer is driven
    pub pool: PoolName,
    /// Replica being transferred
    pub replica_id: ReplicaId,
}

/// Liveness messages exchanged over the pool control channel.
///
/// Pings and pongs carry the same fields; direction is given only by which
/// side initiates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "body", rename_all = "snake_case")]
pub enum LivenessMessage {
    /// Is this transfer still alive?
    Ping(PoolMigrationMessage),
    /// Yes, it is
    Pong(PoolMigrationMessage),
}

impl LivenessMessage {
    /// Build a ping for a transfer
    pub fn ping(correlation_id: CorrelationId, pool: &str, replica_id: &str) -> Self {
        Self::Ping(PoolMigrationMessage {
            correlation_id,
            pool: pool.to_string(),
            replica_id: replica_id.to_string(),
        })
    }

    /// Correlation id carried by the message
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            Self::Ping(m) | Self::Pong(m) => m.correlation_id,
        }
    }

    /// Message body
    pub fn body(&self) -> &PoolMigrationMessage {
        match self {
            Self::Ping(m) | Self::Pong(m) => m,
        }
    }
}

// ============================================================================
// Job Types
// ============================================================================

/// Whether a migrated replica stays on its source pool.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MigrationMode {
    /// Add a replica on the destination, keep the source
    #[default]
    Copy,
    /// Add a replica on the destination, then drop the source location
    Move,
}

/// Predicate over replica metadata selecting the replicas a job migrates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SelectionCriterion {
    /// Every replica known to the location service
    All,
    /// Replicas on the given pool; that pool is the source
    OnPool(PoolName),
    /// Files with fewer than this many replicas
    ReplicaCountBelow(u32),
    /// Files in the given storage group
    StorageGroup(String),
    /// An explicit list of files
    Replicas(Vec<ReplicaId>),
    /// All of the nested criteria
    And(Vec<SelectionCriterion>),
}

impl SelectionCriterion {
    /// Check that the criterion is structurally evaluable.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::All => Ok(()),
            Self::OnPool(pool) if pool.is_empty() => Err("pool name must not be empty".into()),
            Self::OnPool(_) => Ok(()),
            Self::ReplicaCountBelow(0) => Err("replica count bound must be > 0".into()),
            Self::ReplicaCountBelow(_) => Ok(()),
            Self::StorageGroup(group) if group.is_empty() => {
                Err("storage group must not be empty".into())
            }
            Self::StorageGroup(_) => Ok(()),
            Self::Replicas(ids) if ids.is_empty() => Err("replica list must not be empty".into()),
            Self::Replicas(_) => Ok(()),
            Self::And(criteria) if criteria.is_empty() => {
                Err("conjunction must not be empty".into())
            }
            Self::And(criteria) => criteria.iter().try_for_each(|c| c.validate()),
        }
    }

    /// Evaluate the criterion against a replica descriptor
    pub fn matches(&self, replica: &ReplicaDescriptor) -> bool {
        match self {
            Self::All => true,
            Self::OnPool(pool) => replica.is_on(pool),
            Self::ReplicaCountBelow(n) => replica.replica_count() < *n as usize,
            Self::StorageGroup(group) => replica.storage_group == *group,
            Self::Replicas(ids) => ids.iter().any(|id| *id == replica.id),
            Self::And(criteria) => criteria.iter().all(|c| c.matches(replica)),
        }
    }

    /// The pool this criterion names as the source, if any
    pub fn source_pool(&self) -> Option<&PoolName> {
        match self {
            Self::OnPool(pool) => Some(pool),
            Self::And(criteria) => criteria.iter().find_map(|c| c.source_pool()),
            _ => None,
        }
    }
}

/// Target selection policy variants.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "pools", rename_all = "snake_case")]
pub enum PolicyKind {
    /// Any pool with room for the replica, least loaded first
    #[default]
    LeastLoaded,
    /// Like `LeastLoaded`, restricted to the source's storage group
    SameStorageGroup,
    /// Only the listed pools, in order of preference
    PoolList(Vec<PoolName>),
}

/// Payload for submitting a migration job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobPayload {
    /// Which replicas to migrate
    pub criterion: SelectionCriterion,
    /// How to choose destination pools
    #[serde(default)]
    pub policy: PolicyKind,
    /// Maximum concurrently active tasks (engine default when absent)
    #[serde(default)]
    pub concurrency: Option<u32>,
    /// Copy or move semantics
    #[serde(default)]
    pub mode: MigrationMode,
}

/// State of a migration job.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    /// Enumerating replicas and running tasks
    #[default]
    Running,
    /// Cancel requested; waiting for active tasks to stop
    Cancelling,
    /// Enumeration exhausted and every task terminal
    Completed,
    /// Cancelled and every task terminal
    Cancelled,
    /// Enumeration itself failed; active tasks were drained
    Failed,
}

impl JobState {
    /// Whether the job will make no further progress
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

/// State of one replica's migration task.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Admitted by the job driver
    #[default]
    Created,
    /// Asking the selection policy for a destination
    SelectingTarget,
    /// Movers on both pools are streaming the replica
    Transferring,
    /// Data is at the destination; recording the new location
    AwaitingConfirmation,
    /// Destination location durably recorded
    Succeeded,
    /// Permanently failed
    Failed,
    /// Stopped by a cancel request
    Cancelled,
}

impl TaskState {
    /// Whether the task has reached a final state
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Cancelled)
    }
}

/// Why a transfer attempt or task failed.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The selection policy had no eligible destination
    NoEligibleTarget,
    /// Pool capacity could not be read, so no destination was chosen
    PoolInfoUnavailable,
    /// A mover layer refused to start the transfer
    TransferRefused,
    /// A mover reported an I/O failure
    TransferIo,
    /// No pong arrived within the liveness timeout
    LivenessTimeout,
    /// Data reached the destination but the location update failed
    ConfirmationFailed,
    /// The task was cancelled
    Cancelled,
    /// The replica has no recorded location to migrate from
    SourceUnavailable,
}

/// Why a selected replica got no task in a job.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    JsonSchema,
    Display,
    EnumString,
    VariantNames,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// Enumeration returned the replica again after it was admitted
    EnumeratedTwice,
    /// Another job has a task running for the replica
    ClaimedByAnotherJob,
}

/// Task counts of a job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobCounts {
    /// Replicas enumerated and admitted as tasks
    pub total: u64,
    /// Tasks not yet terminal
    pub active: u64,
    /// Tasks that reached `Succeeded`
    pub succeeded: u64,
    /// Tasks that reached `Failed`
    pub failed: u64,
    /// Tasks that reached `Cancelled`
    pub cancelled: u64,
    /// Selected replicas that got no task
    pub skipped: u64,
}

/// Troubleshooting view of one task.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct TaskDiagnostics {
    /// Replica being migrated
    pub replica_id: ReplicaId,
    /// Pool the replica is copied from
    pub source: Option<PoolName>,
    /// Destination of the current or last attempt
    pub target: Option<PoolName>,
    /// Current state
    pub state: TaskState,
    /// Transfer attempts started so far
    pub attempt: u32,
    /// Pools that refused this replica
    pub excluded_pools: Vec<PoolName>,
    /// Reason of the most recent failure
    pub last_failure: Option<FailureReason>,
    /// Text of the most recent failure
    pub last_error: Option<String>,
    /// Bytes reported by the destination mover on completion
    pub bytes_transferred: u64,
}

/// Full job status.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct JobStatus {
    /// Job identifier
    pub id: JobId,
    /// Current state
    pub state: JobState,
    /// Replica selection criterion
    pub criterion: SelectionCriterion,
    /// Target selection policy
    pub policy: PolicyKind,
    /// Copy or move semantics
    pub mode: MigrationMode,
    /// Current concurrency limit
    pub concurrency_limit: u32,
    /// Task counts
    pub counts: JobCounts,
    /// Per-task diagnostics keyed by replica id
    pub tasks: BTreeMap<ReplicaId, TaskDiagnostics>,
    /// Selected replicas that got no task, with the reason
    #[serde(default)]
    pub skipped: BTreeMap<ReplicaId, SkipReason>,
    /// Enumeration error that failed the job
    pub error: Option<String>,
}

impl JobStatus {
    /// Replicas this job did not migrate: failed or cancelled tasks, and
    /// replicas skipped because another job held them
    pub fn unsuccessful_replicas(&self) -> Vec<ReplicaId> {
        let mut replicas: Vec<ReplicaId> = self
            .tasks
            .values()
            .filter(|t| matches!(t.state, TaskState::Failed | TaskState::Cancelled))
            .map(|t| t.replica_id.clone())
            .collect();
        replicas.extend(
            self.skipped
                .iter()
                .filter(|(id, reason)| {
                    **reason == SkipReason::ClaimedByAnotherJob && !self.tasks.contains_key(*id)
                })
                .map(|(id, _)| id.clone()),
        );
        replicas
    }
}

/// Listing entry for a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct JobSummary {
    /// Job identifier
    pub id: JobId,
    /// Current state
    pub state: JobState,
}

/// Update message for dynamically configuring a running job.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", content = "value")]
pub enum JobUpdateMessage {
    /// Set the maximum number of concurrently active tasks
    SetConcurrency(u32),
}

impl JobUpdateMessage {
    /// Validate the update message parameters.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            JobUpdateMessage::SetConcurrency(n) => {
                if *n == 0 {
                    return Err("Concurrency must be > 0".to_string());
                }
                if *n > MAX_JOB_CONCURRENCY {
                    return Err(format!("Concurrency must be <= {}", MAX_JOB_CONCURRENCY));
                }
                Ok(())
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn replica(id: &str, locations: &[&str]) -> ReplicaDescriptor {
        ReplicaDescriptor {
            id: id.to_string(),
            size_bytes: 1024,
            checksum: "1:deadbeef".to_string(),
            locations: locations.iter().map(|s| s.to_string()).collect(),
            storage_group: "tape".to_string(),
        }
    }

    #[test]
    fn test_liveness_message_wire_format() {
        let id = Uuid::nil();
        let ping = LivenessMessage::ping(id, "pool_a", "0000ABCD");
        let json = serde_json::to_value(&ping).expect("serialize ping");
        assert_eq!(
            json,
            serde_json::json!({
                "type": "ping",
                "body": {
                    "correlation_id": "00000000-0000-0000-0000-000000000000",
                    "pool": "pool_a",
                    "replica_id": "0000ABCD"
                }
            })
        );

        let pong = LivenessMessage::Pong(ping.body().clone());
        assert_eq!(pong.correlation_id(), id);
        assert_eq!(pong.body(), ping.body());
    }

    #[test]
    fn test_criterion_matches() {
        let r = replica("a", &["pool_a"]);
        assert!(SelectionCriterion::All.matches(&r));
        assert!(SelectionCriterion::OnPool("pool_a".into()).matches(&r));
        assert!(!SelectionCriterion::OnPool("pool_b".into()).matches(&r));
        assert!(SelectionCriterion::ReplicaCountBelow(2).matches(&r));
        assert!(!SelectionCriterion::ReplicaCountBelow(1).matches(&r));
        assert!(SelectionCriterion::StorageGroup("tape".into()).matches(&r));
        assert!(SelectionCriterion::Replicas(vec!["a".into()]).matches(&r));

        let both = SelectionCriterion::And(vec![
            SelectionCriterion::OnPool("pool_a".into()),
            SelectionCriterion::ReplicaCountBelow(2),
        ]);
        assert!(both.matches(&r));
        assert!(!both.matches(&replica("b", &["pool_a", "pool_b"])));
        assert_eq!(both.source_pool().map(String::as_str), Some("pool_a"));
    }

    #[test]
    fn test_criterion_validate() {
        assert!(SelectionCriterion::All.validate().is_ok());
        assert!(SelectionCriterion::ReplicaCountBelow(0).validate().is_err());
        assert!(SelectionCriterion::OnPool(String::new()).validate().is_err());
        assert!(SelectionCriterion::Replicas(vec![]).validate().is_err());
        assert!(SelectionCriterion::And(vec![]).validate().is_err());
        assert!(
            SelectionCriterion::And(vec![SelectionCriterion::ReplicaCountBelow(0)])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_pool_info_percent_used() {
        let info = PoolInfo {
            name: "p".into(),
            storage_group: String::new(),
            capacity_bytes: 1000,
            free_bytes: 250,
            active_transfers: 0,
        };
        assert_eq!(info.percent_used(), 75);

        let empty = PoolInfo::default();
        assert_eq!(empty.percent_used(), 100);
    }

    #[test]
    fn test_state_terminality() {
        assert!(!JobState::Running.is_terminal());
        assert!(!JobState::Cancelling.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
        assert!(TaskState::Succeeded.is_terminal());
        assert!(!TaskState::AwaitingConfirmation.is_terminal());
    }

    #[test]
    fn test_display_forms() {
        assert_eq!(JobState::Cancelling.to_string(), "cancelling");
        assert_eq!(TaskState::AwaitingConfirmation.to_string(), "awaiting_confirmation");
        assert_eq!(FailureReason::LivenessTimeout.to_string(), "liveness_timeout");
        assert_eq!(TransferRole::Destination.to_string(), "destination");
        assert_eq!(
            TransferRefusal::InsufficientSpace {
                needed: 10,
                available: 5
            }
            .to_string(),
            "insufficient space: need 10 bytes, 5 available"
        );
    }

    #[test]
    fn test_update_message_validate() {
        assert!(JobUpdateMessage::SetConcurrency(0).validate().is_err());
        assert!(JobUpdateMessage::SetConcurrency(5).validate().is_ok());
        assert!(
            JobUpdateMessage::SetConcurrency(MAX_JOB_CONCURRENCY + 1)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_job_payload_defaults() {
        let payload: JobPayload = serde_json::from_str(
            r#"{"criterion":{"type":"on_pool","value":"pool_a"}}"#,
        )
        .expect("deserialize payload");
        assert_eq!(payload.policy, PolicyKind::LeastLoaded);
        assert_eq!(payload.mode, MigrationMode::Copy);
        assert_eq!(payload.concurrency, None);
    }

    #[test]
    fn test_unsuccessful_replicas_include_claimed_skips() {
        let task = |id: &str, state| TaskDiagnostics {
            replica_id: id.to_string(),
            state,
            ..Default::default()
        };
        let status = JobStatus {
            id: Uuid::nil(),
            state: JobState::Completed,
            criterion: SelectionCriterion::All,
            policy: PolicyKind::LeastLoaded,
            mode: MigrationMode::Copy,
            concurrency_limit: 1,
            counts: JobCounts::default(),
            tasks: [
                ("a".to_string(), task("a", TaskState::Succeeded)),
                ("b".to_string(), task("b", TaskState::Failed)),
            ]
            .into(),
            skipped: [
                ("a".to_string(), SkipReason::EnumeratedTwice),
                ("c".to_string(), SkipReason::ClaimedByAnotherJob),
            ]
            .into(),
            error: None,
        };

        assert_eq!(
            status.unsuccessful_replicas(),
            vec!["b".to_string(), "c".to_string()]
        );
    }
}
