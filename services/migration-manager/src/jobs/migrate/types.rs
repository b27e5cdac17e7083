// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration task types

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use migration_types::{FailureReason, JobId, MigrationMode, PoolName, TransferRefusal};

use crate::backoff::Backoff;
use crate::config::EngineConfig;
use crate::events::EventRouter;
use crate::location::{LocationError, LocationService};
use crate::mover::{ControlChannel, MoverDirectory};
use crate::pool_info::PoolCatalog;
use crate::selection::TargetSelectionPolicy;

/// Why a transfer attempt or a whole task failed
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TaskError {
    #[error("No eligible target pool")]
    Selection,

    #[error("Pool info unavailable: {0}")]
    PoolInfo(String),

    #[error("Transfer refused by {pool}: {reason}")]
    TransferStart {
        pool: PoolName,
        reason: TransferRefusal,
    },

    #[error("Transfer failed on {pool}: {cause}")]
    TransferIo { pool: PoolName, cause: String },

    #[error("No pong within {0:?}")]
    LivenessTimeout(Duration),

    #[error("Location update failed: {0}")]
    Confirmation(LocationError),

    #[error("Task cancelled")]
    Cancelled,

    #[error("Replica has no recorded location")]
    SourceUnavailable,
}

impl TaskError {
    /// Reason reported in task diagnostics
    pub fn reason(&self) -> FailureReason {
        match self {
            TaskError::Selection => FailureReason::NoEligibleTarget,
            TaskError::PoolInfo(_) => FailureReason::PoolInfoUnavailable,
            TaskError::TransferStart { .. } => FailureReason::TransferRefused,
            TaskError::TransferIo { .. } => FailureReason::TransferIo,
            TaskError::LivenessTimeout(_) => FailureReason::LivenessTimeout,
            TaskError::Confirmation(_) => FailureReason::ConfirmationFailed,
            TaskError::Cancelled => FailureReason::Cancelled,
            TaskError::SourceUnavailable => FailureReason::SourceUnavailable,
        }
    }

    /// Whether another attempt with a new target may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TaskError::TransferStart { .. }
                | TaskError::TransferIo { .. }
                | TaskError::LivenessTimeout(_)
        )
    }

    /// Pool never to be selected again for this replica
    ///
    /// Only refusals exclude a pool; I/O faults and timeouts are treated as
    /// transient.
    pub fn excluded_pool(&self) -> Option<&PoolName> {
        match self {
            TaskError::TransferStart { pool, .. } => Some(pool),
            _ => None,
        }
    }
}

/// Timing and retry limits of a task, fixed at job submission
#[derive(Debug, Clone)]
pub struct TaskSettings {
    pub max_attempts: u32,
    pub ping_interval: Duration,
    pub liveness_timeout: Duration,
    pub confirm_backoff: Backoff,
}

impl From<&EngineConfig> for TaskSettings {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            ping_interval: config.ping_interval(),
            liveness_timeout: config.liveness_timeout(),
            confirm_backoff: config.confirm_backoff(),
        }
    }
}

/// Collaborators shared by every task of a job
pub struct TaskContext {
    pub job_id: JobId,
    pub mode: MigrationMode,
    pub settings: TaskSettings,
    pub policy: Arc<dyn TargetSelectionPolicy>,
    pub catalog: Arc<PoolCatalog>,
    pub movers: Arc<MoverDirectory>,
    pub control: Arc<dyn ControlChannel>,
    pub location: Arc<dyn LocationService>,
    pub router: Arc<EventRouter>,
}
