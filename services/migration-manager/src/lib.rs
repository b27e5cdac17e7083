// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Migration Manager Library
//!
//! Replica migration engine: jobs select replicas by criterion and copy or
//! move each one to a destination pool chosen by a selection policy, with
//! liveness pings guarding every transfer.
//!
//! # Modules
//!
//! - [`engine`] - Job submission, status, cancel and event intake
//! - [`jobs`] - Job driver and per-replica task state machine
//! - [`config`] - Engine configuration
//! - [`location`] - Location service interface and in-memory implementation
//! - [`mover`] - Mover layers and the liveness control channel
//! - [`pool_info`] - Pool capacity sources and in-flight reservations
//! - [`selection`] - Target selection policies
//! - [`liveness`] - Ping/timeout bookkeeping for one transfer
//! - [`events`] - Correlation id routing of callbacks and pongs
//! - [`backoff`] - Retry delays for location updates
//! - [`metrics`] - Prometheus metrics

pub mod backoff;
pub mod config;
pub mod engine;
pub mod events;
pub mod jobs;
pub mod liveness;
pub mod location;
pub mod metrics;
pub mod mover;
pub mod pool_info;
pub mod selection;

pub use config::EngineConfig;
pub use engine::MigrationEngine;
pub use jobs::JobError;
