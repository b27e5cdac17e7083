// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Per-replica migration task
//!
//! ```text
//! CREATED -> SELECTING_TARGET -> TRANSFERRING -> AWAITING_CONFIRMATION -> SUCCEEDED
//!                  ^                  |
//!                  +-- attempt fails -+            (any state) -> FAILED | CANCELLED
//! ```
//!
//! Each transfer attempt runs under a fresh correlation id. The task waits
//! on a single inbox for mover callbacks and pongs, and on its own ping
//! ticker, so a completion can never race a liveness timeout.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};
use uuid::Uuid;

use migration_types::{
    CorrelationId, JobStatus, LivenessMessage, MigrationMode, PoolName, ReplicaDescriptor,
    TaskDiagnostics, TaskState, TransferEventKind, TransferRequest, TransferRole,
};

use super::types::{TaskContext, TaskError};
use crate::events::TaskEvent;
use crate::liveness::{LivenessAction, LivenessTracker};
use crate::location::LocationError;
use crate::metrics;
use crate::selection::SelectionRequest;

/// What woke a transferring task
enum Wake {
    Cancelled,
    Event(Option<TaskEvent>),
    Tick,
}

/// Resolves once the job is cancelled; never if it no longer can be
pub(crate) async fn wait_cancelled(cancel: &mut watch::Receiver<bool>) {
    if cancel.wait_for(|cancelled| *cancelled).await.is_err() {
        std::future::pending::<()>().await;
    }
}

pub struct MigrationTask {
    ctx: Arc<TaskContext>,
    replica: ReplicaDescriptor,
    diag: TaskDiagnostics,
    cancel: watch::Receiver<bool>,
    status: Arc<watch::Sender<JobStatus>>,
}

impl MigrationTask {
    pub fn new(
        ctx: Arc<TaskContext>,
        replica: ReplicaDescriptor,
        source: Option<PoolName>,
        cancel: watch::Receiver<bool>,
        status: Arc<watch::Sender<JobStatus>>,
    ) -> Self {
        let diag = TaskDiagnostics {
            replica_id: replica.id.clone(),
            source,
            ..Default::default()
        };
        Self {
            ctx,
            replica,
            diag,
            cancel,
            status,
        }
    }

    pub fn diagnostics(&self) -> &TaskDiagnostics {
        &self.diag
    }

    /// Drive the task to a terminal state
    ///
    /// The final diagnostics are returned rather than published; the job
    /// driver records them together with the job counts.
    pub async fn run(mut self) -> TaskDiagnostics {
        match self.drive().await {
            Ok(()) => {
                self.diag.state = TaskState::Succeeded;
                info!(
                    job_id = %self.ctx.job_id,
                    replica_id = %self.replica.id,
                    pool = ?self.diag.target,
                    attempt = self.diag.attempt,
                    bytes = self.diag.bytes_transferred,
                    "Replica migrated"
                );
            }
            Err(TaskError::Cancelled) => {
                self.record_failure(&TaskError::Cancelled);
                self.diag.state = TaskState::Cancelled;
                info!(
                    job_id = %self.ctx.job_id,
                    replica_id = %self.replica.id,
                    "Task cancelled"
                );
            }
            Err(e) => {
                self.record_failure(&e);
                self.diag.state = TaskState::Failed;
                warn!(
                    job_id = %self.ctx.job_id,
                    replica_id = %self.replica.id,
                    attempt = self.diag.attempt,
                    reason = %e.reason(),
                    error = %e,
                    "Task failed"
                );
            }
        }

        metrics::record_task(self.diag.state);
        self.diag
    }

    async fn drive(&mut self) -> Result<(), TaskError> {
        let source = self
            .diag
            .source
            .clone()
            .ok_or(TaskError::SourceUnavailable)?;

        let target = loop {
            if *self.cancel.borrow() {
                return Err(TaskError::Cancelled);
            }

            self.transition(TaskState::SelectingTarget);
            let target = self.select_target(&source).await?;
            self.diag.attempt += 1;
            self.diag.target = Some(target.clone());

            match self.attempt(&source, &target).await {
                Ok(bytes) => {
                    self.diag.bytes_transferred = bytes;
                    break target;
                }
                Err(TaskError::Cancelled) => return Err(TaskError::Cancelled),
                Err(e) => {
                    warn!(
                        job_id = %self.ctx.job_id,
                        replica_id = %self.replica.id,
                        pool = %target,
                        attempt = self.diag.attempt,
                        reason = %e.reason(),
                        error = %e,
                        "Transfer attempt failed"
                    );
                    metrics::record_attempt_failure(e.reason());
                    self.record_failure(&e);

                    if let Some(pool) = e.excluded_pool() {
                        if !self.diag.excluded_pools.contains(pool) {
                            self.diag.excluded_pools.push(pool.clone());
                        }
                    }

                    if !e.is_retryable() || self.diag.attempt >= self.ctx.settings.max_attempts {
                        return Err(e);
                    }
                }
            }
        };

        // Past this point the data is on the destination; cancel no longer applies
        self.transition(TaskState::AwaitingConfirmation);
        self.confirm(&source, &target).await
    }

    fn record_failure(&mut self, error: &TaskError) {
        self.diag.last_failure = Some(error.reason());
        self.diag.last_error = Some(error.to_string());
    }

    fn transition(&mut self, state: TaskState) {
        debug!(
            job_id = %self.ctx.job_id,
            replica_id = %self.replica.id,
            from = %self.diag.state,
            to = %state,
            attempt = self.diag.attempt,
            "Task transition"
        );
        self.diag.state = state;

        let diag = self.diag.clone();
        self.status.send_modify(|status| {
            status.tasks.insert(diag.replica_id.clone(), diag);
        });
    }

    async fn select_target(&self, source: &str) -> Result<PoolName, TaskError> {
        let candidates = self.ctx.catalog.candidates().await.map_err(|e| {
            warn!(
                job_id = %self.ctx.job_id,
                replica_id = %self.replica.id,
                error = %e,
                "Failed to get pool info"
            );
            TaskError::PoolInfo(e.to_string())
        })?;

        let request = SelectionRequest {
            source,
            replica: &self.replica,
            excluded: &self.diag.excluded_pools,
            candidates: &candidates,
        };

        let target = self.ctx.policy.select_target(&request);
        debug!(
            job_id = %self.ctx.job_id,
            replica_id = %self.replica.id,
            policy = self.ctx.policy.name(),
            excluded = ?self.diag.excluded_pools,
            target = ?target,
            "Selected target"
        );
        target.ok_or(TaskError::Selection)
    }

    /// One transfer attempt under a fresh correlation id
    ///
    /// Returns the bytes reported by the destination mover.
    async fn attempt(&mut self, source: &str, target: &str) -> Result<u64, TaskError> {
        let correlation_id = Uuid::new_v4();
        let _reservation = self
            .ctx
            .catalog
            .reserve(target, self.replica.size_bytes)
            .await;
        let mut inbox = self.ctx.router.register(correlation_id).await;

        self.transition(TaskState::Transferring);
        let result = self
            .transfer(correlation_id, source, target, &mut inbox)
            .await;

        self.ctx.router.unregister(&correlation_id).await;
        result
    }

    async fn transfer(
        &self,
        correlation_id: CorrelationId,
        source: &str,
        target: &str,
        inbox: &mut mpsc::UnboundedReceiver<TaskEvent>,
    ) -> Result<u64, TaskError> {
        let request = |role: TransferRole, peer: &str| TransferRequest {
            correlation_id,
            replica: self.replica.clone(),
            role,
            peer: peer.to_string(),
        };

        debug!(
            job_id = %self.ctx.job_id,
            replica_id = %self.replica.id,
            correlation_id = %correlation_id,
            source = %source,
            pool = %target,
            "Starting transfer"
        );

        self.ctx
            .movers
            .start(target, &request(TransferRole::Destination, source))
            .await
            .map_err(|reason| TaskError::TransferStart {
                pool: target.to_string(),
                reason,
            })?;

        if let Err(reason) = self
            .ctx
            .movers
            .start(source, &request(TransferRole::Source, target))
            .await
        {
            self.ctx.movers.abort(target, &correlation_id).await;
            return Err(TaskError::TransferStart {
                pool: source.to_string(),
                reason,
            });
        }

        let settings = &self.ctx.settings;
        let mut tracker = LivenessTracker::new(settings.ping_interval, settings.liveness_timeout);
        let mut ticker = tokio::time::interval(settings.ping_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancel = self.cancel.clone();

        loop {
            let wake = tokio::select! {
                biased;
                _ = wait_cancelled(&mut cancel) => Wake::Cancelled,
                event = inbox.recv() => Wake::Event(event),
                _ = ticker.tick() => Wake::Tick,
            };

            match wake {
                Wake::Cancelled => {
                    self.abort_both(correlation_id, source, target).await;
                    return Err(TaskError::Cancelled);
                }
                Wake::Event(None) => {
                    self.abort_both(correlation_id, source, target).await;
                    return Err(TaskError::TransferIo {
                        pool: target.to_string(),
                        cause: "event route closed".to_string(),
                    });
                }
                Wake::Event(Some(TaskEvent::Pong(pong))) => {
                    if pong.replica_id == self.replica.id {
                        tracker.on_pong(Instant::now());
                    }
                }
                Wake::Event(Some(TaskEvent::Transfer(event))) => match (event.role, event.kind) {
                    (TransferRole::Destination, TransferEventKind::Completed { bytes_transferred }) => {
                        // Release the source side if it has not reported yet
                        self.ctx.movers.abort(source, &correlation_id).await;
                        return Ok(bytes_transferred);
                    }
                    (TransferRole::Source, TransferEventKind::Completed { .. }) => {
                        debug!(
                            job_id = %self.ctx.job_id,
                            correlation_id = %correlation_id,
                            "Source finished sending"
                        );
                    }
                    (_, TransferEventKind::Failed { cause }) => {
                        self.abort_both(correlation_id, source, target).await;
                        return Err(TaskError::TransferIo {
                            pool: event.pool,
                            cause,
                        });
                    }
                },
                Wake::Tick => match tracker.poll(Instant::now()) {
                    LivenessAction::SendPing => {
                        let ping = LivenessMessage::ping(correlation_id, source, &self.replica.id);
                        self.ctx.control.send(target, ping).await;
                    }
                    LivenessAction::Expired => {
                        metrics::record_liveness_timeout();
                        self.abort_both(correlation_id, source, target).await;
                        return Err(TaskError::LivenessTimeout(tracker.timeout()));
                    }
                    LivenessAction::Idle => {}
                },
            }
        }
    }

    async fn abort_both(&self, correlation_id: CorrelationId, source: &str, target: &str) {
        self.ctx.movers.abort(target, &correlation_id).await;
        self.ctx.movers.abort(source, &correlation_id).await;
    }

    /// Record the destination, then drop the source for move jobs
    async fn confirm(&self, source: &str, target: &str) -> Result<(), TaskError> {
        let location = &self.ctx.location;
        let replica_id = self.replica.id.as_str();

        self.with_backoff(|| location.add_location(replica_id, target))
            .await?;

        if self.ctx.mode == MigrationMode::Move {
            self.with_backoff(|| location.remove_location(replica_id, source))
                .await?;
        }
        Ok(())
    }

    /// Retry a location update on transient errors only
    async fn with_backoff<F, Fut>(&self, mut op: F) -> Result<(), TaskError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<(), LocationError>>,
    {
        let backoff = &self.ctx.settings.confirm_backoff;
        let mut attempt = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_transient() && attempt < backoff.max_attempts() => {
                    let delay = backoff.delay(attempt);
                    warn!(
                        job_id = %self.ctx.job_id,
                        replica_id = %self.replica.id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Location update failed, retrying"
                    );
                    metrics::record_confirmation_retry();
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(TaskError::Confirmation(e)),
            }
        }
    }
}
