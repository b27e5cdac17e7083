// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Migration job driver
//!
//! The driver pulls replicas from the location service's enumeration one
//! at a time, only once a concurrency permit is free, and runs a
//! `MigrationTask` for each. It owns the job counts: tasks publish their
//! intermediate states, while terminal states and counts are recorded here
//! in a single status update.

mod task;
mod types;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::{Mutex, OwnedSemaphorePermit, Semaphore, watch};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use migration_types::{
    JobCounts, JobState, JobStatus, JobUpdateMessage, MAX_JOB_CONCURRENCY, PolicyKind, PoolName,
    ReplicaDescriptor, ReplicaId, SelectionCriterion, SkipReason, TaskDiagnostics, TaskState,
};

use crate::location::{LocationError, ReplicaStream};

pub use task::MigrationTask;
pub(crate) use task::wait_cancelled;
pub use types::{TaskContext, TaskError, TaskSettings};

/// Replicas with a running task, across every job of an engine
///
/// A replica claimed here is skipped by other jobs until its task ends.
#[derive(Debug, Default)]
pub struct ReplicaClaims {
    active: Mutex<HashSet<ReplicaId>>,
}

impl ReplicaClaims {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the replica is already claimed
    pub async fn claim(&self, replica_id: &str) -> bool {
        self.active.lock().await.insert(replica_id.to_string())
    }

    pub async fn release(&self, replica_id: &str) {
        self.active.lock().await.remove(replica_id);
    }

    pub async fn len(&self) -> usize {
        self.active.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.active.lock().await.is_empty()
    }
}

/// Engine-side handles of a running job
pub struct JobControl {
    pub status: Arc<watch::Sender<JobStatus>>,
    pub cancel: watch::Sender<bool>,
    pub updates: watch::Sender<Option<JobUpdateMessage>>,
}

/// Source pool for a replica
///
/// A criterion naming a pool pins the source to it; otherwise the first
/// recorded location is used.
fn choose_source(criterion: &SelectionCriterion, replica: &ReplicaDescriptor) -> Option<PoolName> {
    criterion
        .source_pool()
        .filter(|pool| replica.is_on(pool))
        .or_else(|| replica.locations.first())
        .cloned()
}

/// Record a selected replica that gets no task
///
/// The first reason recorded for a replica is kept.
fn record_skip(status: &mut JobStatus, replica_id: &str, reason: SkipReason) {
    status.counts.skipped += 1;
    status
        .skipped
        .entry(replica_id.to_string())
        .or_insert(reason);
}

fn count_terminal(counts: &mut JobCounts, state: TaskState) {
    counts.active = counts.active.saturating_sub(1);
    match state {
        TaskState::Succeeded => counts.succeeded += 1,
        TaskState::Cancelled => counts.cancelled += 1,
        _ => counts.failed += 1,
    }
}

enum Admission {
    Next(OwnedSemaphorePermit, Result<ReplicaDescriptor, LocationError>),
    Exhausted,
    Closed,
}

async fn next_admission(semaphore: &Arc<Semaphore>, replicas: &mut ReplicaStream) -> Admission {
    let Ok(permit) = Arc::clone(semaphore).acquire_owned().await else {
        return Admission::Closed;
    };
    match replicas.next().await {
        Some(item) => Admission::Next(permit, item),
        None => Admission::Exhausted,
    }
}

enum Wake {
    Cancel,
    Update(bool),
    Joined(Result<(tokio::task::Id, TaskDiagnostics), JoinError>),
    Admit(Admission),
}

/// Tracks the permits a concurrency decrease could not take back yet
///
/// `forget_permits` only removes idle permits; the rest are forgotten as
/// running tasks hand theirs back.
struct ConcurrencyLimit {
    semaphore: Arc<Semaphore>,
    limit: u32,
    owed: usize,
}

impl ConcurrencyLimit {
    fn new(limit: u32) -> Self {
        let limit = limit.clamp(1, MAX_JOB_CONCURRENCY);
        let semaphore = Arc::new(Semaphore::new(MAX_JOB_CONCURRENCY as usize));
        let mut this = Self {
            semaphore,
            limit: MAX_JOB_CONCURRENCY,
            owed: 0,
        };
        this.set(limit);
        this
    }

    fn set(&mut self, limit: u32) {
        let limit = limit.clamp(1, MAX_JOB_CONCURRENCY);
        if limit > self.limit {
            let mut delta = (limit - self.limit) as usize;
            let repaid = delta.min(self.owed);
            self.owed -= repaid;
            delta -= repaid;
            self.semaphore.add_permits(delta);
        } else if limit < self.limit {
            self.owed += (self.limit - limit) as usize;
            self.settle();
        }
        self.limit = limit;
    }

    fn settle(&mut self) {
        if self.owed > 0 {
            self.owed -= self.semaphore.forget_permits(self.owed);
        }
    }
}

pub struct MigrationJob {
    ctx: Arc<TaskContext>,
    criterion: SelectionCriterion,
    replicas: ReplicaStream,
    claims: Arc<ReplicaClaims>,
    status: Arc<watch::Sender<JobStatus>>,
    cancel: watch::Receiver<bool>,
    updates: watch::Receiver<Option<JobUpdateMessage>>,
    concurrency: u32,
}

impl MigrationJob {
    pub fn new(
        ctx: Arc<TaskContext>,
        criterion: SelectionCriterion,
        policy: PolicyKind,
        concurrency: u32,
        replicas: ReplicaStream,
        claims: Arc<ReplicaClaims>,
    ) -> (Self, JobControl) {
        let (status, _) = watch::channel(JobStatus {
            id: ctx.job_id,
            state: JobState::Running,
            criterion: criterion.clone(),
            policy,
            mode: ctx.mode,
            concurrency_limit: concurrency,
            counts: JobCounts::default(),
            tasks: Default::default(),
            skipped: Default::default(),
            error: None,
        });
        let status = Arc::new(status);
        let (cancel_tx, cancel) = watch::channel(false);
        let (updates_tx, updates) = watch::channel(None);

        let job = Self {
            ctx,
            criterion,
            replicas,
            claims,
            status: Arc::clone(&status),
            cancel,
            updates,
            concurrency,
        };
        let control = JobControl {
            status,
            cancel: cancel_tx,
            updates: updates_tx,
        };
        (job, control)
    }

    /// Run the job until enumeration ends and every task is terminal
    pub async fn run(self) {
        let MigrationJob {
            ctx,
            criterion,
            mut replicas,
            claims,
            status,
            cancel,
            mut updates,
            concurrency,
        } = self;
        let job_id = ctx.job_id;

        info!(
            job_id = %job_id,
            concurrency,
            policy = ctx.policy.name(),
            mode = %ctx.mode,
            "Starting migration job"
        );

        let mut limit = ConcurrencyLimit::new(concurrency);
        let mut tasks: JoinSet<TaskDiagnostics> = JoinSet::new();
        let mut running: HashMap<tokio::task::Id, ReplicaId> = HashMap::new();
        let mut seen: HashSet<ReplicaId> = HashSet::new();
        let mut cancel_rx = cancel.clone();
        let mut enumerating = true;
        let mut cancelled = false;
        let mut updates_open = true;
        let mut enumeration_error: Option<String> = None;

        loop {
            if !enumerating && tasks.is_empty() {
                break;
            }

            let wake = tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancel_rx), if !cancelled => Wake::Cancel,
                changed = updates.changed(), if updates_open => Wake::Update(changed.is_ok()),
                Some(joined) = tasks.join_next_with_id(), if !tasks.is_empty() => {
                    Wake::Joined(joined)
                }
                admission = next_admission(&limit.semaphore, &mut replicas), if enumerating => {
                    Wake::Admit(admission)
                }
            };

            match wake {
                Wake::Cancel => {
                    info!(job_id = %job_id, active = tasks.len(), "Cancelling migration job");
                    cancelled = true;
                    enumerating = false;
                    status.send_if_modified(|s| {
                        if s.state == JobState::Running {
                            s.state = JobState::Cancelling;
                            true
                        } else {
                            false
                        }
                    });
                }
                Wake::Update(false) => updates_open = false,
                Wake::Update(true) => {
                    let update = updates.borrow_and_update().clone();
                    if let Some(JobUpdateMessage::SetConcurrency(n)) = update {
                        limit.set(n);
                        let new_limit = limit.limit;
                        status.send_modify(|s| s.concurrency_limit = new_limit);
                        info!(job_id = %job_id, concurrency = new_limit, "Concurrency updated");
                    }
                }
                Wake::Joined(Ok((id, diag))) => {
                    running.remove(&id);
                    claims.release(&diag.replica_id).await;
                    limit.settle();
                    status.send_modify(|s| {
                        count_terminal(&mut s.counts, diag.state);
                        s.tasks.insert(diag.replica_id.clone(), diag);
                    });
                }
                Wake::Joined(Err(e)) => {
                    limit.settle();
                    let Some(replica_id) = running.remove(&e.id()) else {
                        error!(job_id = %job_id, error = %e, "Untracked migration task ended");
                        continue;
                    };
                    error!(
                        job_id = %job_id,
                        replica_id = %replica_id,
                        error = %e,
                        "Migration task panicked"
                    );
                    claims.release(&replica_id).await;
                    status.send_modify(|s| {
                        count_terminal(&mut s.counts, TaskState::Failed);
                        let diag = s.tasks.entry(replica_id.clone()).or_default();
                        diag.replica_id = replica_id;
                        diag.state = TaskState::Failed;
                        diag.last_error = Some(format!("task panicked: {}", e));
                    });
                }
                Wake::Admit(Admission::Next(permit, Ok(replica))) => {
                    let skip = if !seen.insert(replica.id.clone()) {
                        Some(SkipReason::EnumeratedTwice)
                    } else if !claims.claim(&replica.id).await {
                        Some(SkipReason::ClaimedByAnotherJob)
                    } else {
                        None
                    };
                    if let Some(reason) = skip {
                        info!(
                            job_id = %job_id,
                            replica_id = %replica.id,
                            reason = %reason,
                            "Skipping replica"
                        );
                        status.send_modify(|s| record_skip(s, &replica.id, reason));
                        continue;
                    }

                    let replica_id = replica.id.clone();
                    let source = choose_source(&criterion, &replica);
                    let task = MigrationTask::new(
                        Arc::clone(&ctx),
                        replica,
                        source,
                        cancel.clone(),
                        Arc::clone(&status),
                    );

                    let diag = task.diagnostics().clone();
                    status.send_modify(|s| {
                        s.counts.total += 1;
                        s.counts.active += 1;
                        s.tasks.insert(diag.replica_id.clone(), diag);
                    });

                    let handle = tasks.spawn(async move {
                        let _permit = permit;
                        task.run().await
                    });
                    running.insert(handle.id(), replica_id);
                }
                Wake::Admit(Admission::Next(_, Err(e))) => {
                    error!(job_id = %job_id, error = %e, "Replica enumeration failed");
                    enumeration_error = Some(e.to_string());
                    enumerating = false;
                }
                Wake::Admit(Admission::Exhausted) => {
                    debug!(job_id = %job_id, "Replica enumeration exhausted");
                    enumerating = false;
                }
                Wake::Admit(Admission::Closed) => {
                    warn!(job_id = %job_id, "Admission semaphore closed");
                    enumerating = false;
                }
            }
        }

        let final_state = if cancelled {
            JobState::Cancelled
        } else if enumeration_error.is_some() {
            JobState::Failed
        } else {
            JobState::Completed
        };

        let mut counts = JobCounts::default();
        status.send_modify(|s| {
            s.state = final_state;
            s.error = enumeration_error;
            counts = s.counts;
        });

        info!(
            job_id = %job_id,
            state = %final_state,
            total = counts.total,
            succeeded = counts.succeeded,
            failed = counts.failed,
            cancelled = counts.cancelled,
            skipped = counts.skipped,
            "Migration job finished"
        );
    }
}
