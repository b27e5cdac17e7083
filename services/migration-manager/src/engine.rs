// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Migration engine
//!
//! Front door of the crate: accepts job submissions, answers status
//! queries and feeds mover callbacks and liveness replies to the tasks that
//! own them.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use tokio::sync::{RwLock, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use migration_types::{
    JobId, JobPayload, JobState, JobStatus, JobSummary, JobUpdateMessage, LivenessMessage,
    MAX_JOB_CONCURRENCY, MigrationMode, PolicyKind, SelectionCriterion, TransferEvent,
};

use crate::config::EngineConfig;
use crate::events::{EventRouter, TaskEvent};
use crate::jobs::JobError;
use crate::jobs::migrate::{JobControl, MigrationJob, ReplicaClaims, TaskContext, TaskSettings};
use crate::location::{LocationError, LocationService};
use crate::mover::{ControlChannel, MoverDirectory};
use crate::pool_info::{PoolCatalog, PoolInfoClient, PoolInfoError, PoolInfoProvider};
use crate::selection::{SelectionLimits, build_policy};

pub struct MigrationEngine {
    config: watch::Sender<EngineConfig>,
    location: Arc<dyn LocationService>,
    catalog: Arc<PoolCatalog>,
    movers: Arc<MoverDirectory>,
    control: Arc<dyn ControlChannel>,
    router: Arc<EventRouter>,
    claims: Arc<ReplicaClaims>,
    jobs: RwLock<HashMap<JobId, JobControl>>,
}

impl MigrationEngine {
    pub fn new(
        config: EngineConfig,
        location: Arc<dyn LocationService>,
        pool_info: Arc<dyn PoolInfoProvider>,
        movers: Arc<MoverDirectory>,
        control: Arc<dyn ControlChannel>,
    ) -> Self {
        let (config, _) = watch::channel(config);
        Self {
            config,
            location,
            catalog: Arc::new(PoolCatalog::new(pool_info)),
            movers,
            control,
            router: Arc::new(EventRouter::new()),
            claims: Arc::new(ReplicaClaims::new()),
            jobs: RwLock::new(HashMap::new()),
        }
    }

    /// Build an engine that reads pool capacity from `config.pool_info_url`
    pub fn with_pool_info_service(
        config: EngineConfig,
        location: Arc<dyn LocationService>,
        movers: Arc<MoverDirectory>,
        control: Arc<dyn ControlChannel>,
    ) -> Result<Self, PoolInfoError> {
        let url = config
            .pool_info_url
            .clone()
            .ok_or(PoolInfoError::Unavailable)?;
        let client = PoolInfoClient::new(url, config.http_timeout_secs, config.pool_info_refresh_secs)?;
        Ok(Self::new(config, location, Arc::new(client), movers, control))
    }

    /// Current configuration
    pub fn config(&self) -> EngineConfig {
        self.config.borrow().clone()
    }

    /// Apply the reloadable fields of `new`; affects jobs submitted later
    pub fn reload_config(&self, new: &EngineConfig) -> Result<()> {
        new.validate()?;
        self.config.send_modify(|config| config.merge_reloadable(new));
        info!("Engine configuration reloaded");
        Ok(())
    }

    pub fn movers(&self) -> Arc<MoverDirectory> {
        Arc::clone(&self.movers)
    }

    /// Create a job and begin driving it asynchronously
    pub async fn submit(
        &self,
        criterion: SelectionCriterion,
        policy: PolicyKind,
        concurrency: Option<u32>,
    ) -> Result<JobId, JobError> {
        self.submit_payload(JobPayload {
            criterion,
            policy,
            concurrency,
            mode: MigrationMode::Copy,
        })
        .await
    }

    pub async fn submit_payload(&self, payload: JobPayload) -> Result<JobId, JobError> {
        payload
            .criterion
            .validate()
            .map_err(JobError::InvalidCriterion)?;

        let config = self.config();
        let concurrency = payload.concurrency.unwrap_or(config.default_concurrency);
        if concurrency == 0 || concurrency > MAX_JOB_CONCURRENCY {
            return Err(JobError::InvalidConcurrency(concurrency));
        }

        let replicas = self
            .location
            .query(&payload.criterion)
            .await
            .map_err(|e| match e {
                LocationError::UnsupportedCriterion(msg) => JobError::InvalidCriterion(msg),
                other => JobError::Location(other),
            })?;

        let job_id = Uuid::new_v4();
        let limits = SelectionLimits {
            max_fill_percentage: config.max_fill_percentage,
            excluded_storage_groups: config.excluded_storage_groups.clone(),
        };
        let ctx = Arc::new(TaskContext {
            job_id,
            mode: payload.mode,
            settings: TaskSettings::from(&config),
            policy: build_policy(&payload.policy, limits),
            catalog: Arc::clone(&self.catalog),
            movers: Arc::clone(&self.movers),
            control: Arc::clone(&self.control),
            location: Arc::clone(&self.location),
            router: Arc::clone(&self.router),
        });

        let (job, control) = MigrationJob::new(
            ctx,
            payload.criterion.clone(),
            payload.policy.clone(),
            concurrency,
            replicas,
            Arc::clone(&self.claims),
        );
        self.jobs.write().await.insert(job_id, control);
        tokio::spawn(job.run());

        info!(
            job_id = %job_id,
            criterion = ?payload.criterion,
            policy = ?payload.policy,
            mode = %payload.mode,
            concurrency,
            "Migration job submitted"
        );
        Ok(job_id)
    }

    /// Request cancellation; a no-op for terminal or already cancelling jobs
    pub async fn cancel(&self, job_id: &JobId) -> Result<(), JobError> {
        let jobs = self.jobs.read().await;
        let control = jobs.get(job_id).ok_or(JobError::JobNotFound(*job_id))?;

        if control.status.borrow().state.is_terminal() {
            debug!(job_id = %job_id, "Cancel of finished job ignored");
            return Ok(());
        }

        control.cancel.send_replace(true);
        control.status.send_if_modified(|s| {
            if s.state == JobState::Running {
                s.state = JobState::Cancelling;
                true
            } else {
                false
            }
        });
        info!(job_id = %job_id, "Job cancel requested");
        Ok(())
    }

    /// Snapshot of a job's state, counts and per-task diagnostics
    pub async fn status(&self, job_id: &JobId) -> Result<JobStatus, JobError> {
        let jobs = self.jobs.read().await;
        let control = jobs.get(job_id).ok_or(JobError::JobNotFound(*job_id))?;
        Ok(control.status.borrow().clone())
    }

    /// Receiver notified on every status change of a job
    pub async fn watch_job(&self, job_id: &JobId) -> Result<watch::Receiver<JobStatus>, JobError> {
        let jobs = self.jobs.read().await;
        let control = jobs.get(job_id).ok_or(JobError::JobNotFound(*job_id))?;
        Ok(control.status.subscribe())
    }

    pub async fn list_jobs(&self) -> Vec<JobSummary> {
        let jobs = self.jobs.read().await;
        let mut summaries: Vec<_> = jobs
            .iter()
            .map(|(id, control)| JobSummary {
                id: *id,
                state: control.status.borrow().state,
            })
            .collect();
        summaries.sort_by_key(|s| s.id);
        summaries
    }

    /// Adjust a running job
    pub async fn update_job(&self, job_id: &JobId, msg: JobUpdateMessage) -> Result<(), JobError> {
        msg.validate().map_err(JobError::InvalidUpdate)?;

        let jobs = self.jobs.read().await;
        let control = jobs.get(job_id).ok_or(JobError::JobNotFound(*job_id))?;
        let state = control.status.borrow().state;
        if state != JobState::Running {
            return Err(JobError::InvalidUpdate(format!("job is {}", state)));
        }

        info!(job_id = %job_id, update = ?msg, "Job update requested");
        control.updates.send_replace(Some(msg));
        Ok(())
    }

    /// Submit a new job covering the failed and cancelled replicas of a
    /// finished one
    pub async fn retry_job(&self, job_id: &JobId) -> Result<JobId, JobError> {
        let status = self.status(job_id).await?;
        if !status.state.is_terminal() {
            return Err(JobError::JobNotTerminal {
                id: *job_id,
                state: status.state,
            });
        }

        let replicas = status.unsuccessful_replicas();
        if replicas.is_empty() {
            return Err(JobError::NothingToRetry(*job_id));
        }

        info!(job_id = %job_id, replicas = replicas.len(), "Retrying migration job");
        self.submit_payload(JobPayload {
            criterion: SelectionCriterion::Replicas(replicas),
            policy: status.policy,
            concurrency: Some(status.concurrency_limit),
            mode: status.mode,
        })
        .await
    }

    /// Forget a finished job, returning its final status
    pub async fn remove_job(&self, job_id: &JobId) -> Result<JobStatus, JobError> {
        let mut jobs = self.jobs.write().await;
        let control = jobs.get(job_id).ok_or(JobError::JobNotFound(*job_id))?;
        let state = control.status.borrow().state;
        if !state.is_terminal() {
            return Err(JobError::JobNotTerminal { id: *job_id, state });
        }

        let status = control.status.borrow().clone();
        jobs.remove(job_id);
        info!(job_id = %job_id, "Job removed");
        Ok(status)
    }

    /// Route a mover callback; returns false if it was stale
    pub async fn on_transfer_event(&self, event: TransferEvent) -> bool {
        self.router.deliver(TaskEvent::Transfer(event)).await
    }

    /// Route a liveness message from a pool; only pongs are consumed
    pub async fn on_liveness_message(&self, message: LivenessMessage) -> bool {
        match message {
            LivenessMessage::Pong(body) => self.router.deliver(TaskEvent::Pong(body)).await,
            LivenessMessage::Ping(body) => {
                debug!(
                    correlation_id = %body.correlation_id,
                    pool = %body.pool,
                    "Ignoring ping sent to the engine"
                );
                false
            }
        }
    }

    /// Forward a pool's mover callbacks into the engine
    pub fn attach_pool_events(
        &self,
        mut events: mpsc::UnboundedReceiver<TransferEvent>,
    ) -> JoinHandle<()> {
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                router.deliver(TaskEvent::Transfer(event)).await;
            }
        })
    }

    /// Forward liveness replies from the control channel into the engine
    pub fn attach_control_replies(
        &self,
        mut replies: mpsc::UnboundedReceiver<LivenessMessage>,
    ) -> JoinHandle<()> {
        let router = Arc::clone(&self.router);
        tokio::spawn(async move {
            while let Some(message) = replies.recv().await {
                if let LivenessMessage::Pong(body) = message {
                    router.deliver(TaskEvent::Pong(body)).await;
                }
            }
        })
    }

    /// Number of transfer attempts currently routed
    pub async fn routed_attempts(&self) -> usize {
        self.router.len().await
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::location::MemoryLocationService;
    use crate::mover::LocalControlChannel;
    use crate::pool_info::StaticPoolInfo;

    fn engine() -> MigrationEngine {
        let (control, _replies) = LocalControlChannel::new();
        MigrationEngine::new(
            EngineConfig::default(),
            Arc::new(MemoryLocationService::new()),
            Arc::new(StaticPoolInfo::new(Vec::new())),
            Arc::new(MoverDirectory::new()),
            Arc::new(control),
        )
    }

    #[tokio::test]
    async fn rejects_invalid_submissions() {
        let engine = engine();

        let err = engine
            .submit(SelectionCriterion::Replicas(Vec::new()), PolicyKind::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidCriterion(_)));

        let err = engine
            .submit(SelectionCriterion::All, PolicyKind::default(), Some(0))
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidConcurrency(0)));

        let err = engine
            .submit(
                SelectionCriterion::All,
                PolicyKind::default(),
                Some(MAX_JOB_CONCURRENCY + 1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, JobError::InvalidConcurrency(_)));
        assert!(engine.list_jobs().await.is_empty());
    }

    #[tokio::test]
    async fn unknown_job() {
        let engine = engine();
        let id = Uuid::new_v4();
        assert!(matches!(
            engine.status(&id).await,
            Err(JobError::JobNotFound(_))
        ));
        assert!(matches!(
            engine.cancel(&id).await,
            Err(JobError::JobNotFound(_))
        ));
        assert!(matches!(
            engine.remove_job(&id).await,
            Err(JobError::JobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn pings_to_engine_are_ignored() {
        let engine = engine();
        let ping = LivenessMessage::ping(Uuid::new_v4(), "pool_a", "r1");
        assert!(!engine.on_liveness_message(ping).await);
    }

    #[tokio::test]
    async fn reload_rejects_invalid_config() {
        let engine = engine();
        let bad = EngineConfig {
            max_attempts: 0,
            ..Default::default()
        };
        assert!(engine.reload_config(&bad).is_err());

        let good = EngineConfig {
            max_attempts: 9,
            ..Default::default()
        };
        engine.reload_config(&good).unwrap();
        assert_eq!(engine.config().max_attempts, 9);
    }

    #[tokio::test]
    async fn empty_job_completes() {
        let engine = engine();
        let id = engine
            .submit(SelectionCriterion::All, PolicyKind::default(), Some(2))
            .await
            .unwrap();

        let mut rx = engine.watch_job(&id).await.unwrap();
        rx.wait_for(|s| s.state.is_terminal()).await.unwrap();

        let status = engine.status(&id).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert_eq!(status.counts.total, 0);

        // Cancel after completion is a no-op
        engine.cancel(&id).await.unwrap();
        assert_eq!(engine.status(&id).await.unwrap().state, JobState::Completed);

        assert!(matches!(
            engine.retry_job(&id).await,
            Err(JobError::NothingToRetry(_))
        ));
        engine.remove_job(&id).await.unwrap();
        assert!(engine.list_jobs().await.is_empty());
    }
}
