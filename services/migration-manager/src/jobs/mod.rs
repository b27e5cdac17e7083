// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Job execution for the migration engine
//!
//! A migration job enumerates replicas matching a criterion and runs one
//! migration task per replica, a bounded number at a time.

pub mod migrate;

use thiserror::Error;

use migration_types::{JobId, JobState};

use crate::location::LocationError;

/// Job errors
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Invalid criterion: {0}")]
    InvalidCriterion(String),

    #[error("Invalid concurrency limit: {0}")]
    InvalidConcurrency(u32),

    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job {id} is {state}, not terminal")]
    JobNotTerminal { id: JobId, state: JobState },

    #[error("Cannot update job: {0}")]
    InvalidUpdate(String),

    #[error("Job {0} has no unmigrated replicas to retry")]
    NothingToRetry(JobId),

    #[error("Location service error: {0}")]
    Location(#[from] LocationError),
}
