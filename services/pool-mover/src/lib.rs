// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Pool Mover Library
//!
//! This library runs inside each pool process and is the pool's half of
//! replica migration. It tracks the transfers the pool takes part in and
//! answers liveness pings for them.
//!
//! # Modules
//!
//! - [`config`] - Pool configuration (capacity, allocation increment)
//! - [`registry`] - Mover bridge registry keyed by correlation id
//! - [`mover`] - Transfer acceptance (space checks, refusal, abort)
//! - [`liveness`] - Ping responder
//! - [`metrics`] - Prometheus counters for the pool side

pub mod config;
pub mod liveness;
pub mod metrics;
pub mod mover;
pub mod registry;

pub use liveness::LivenessResponder;
pub use mover::PoolMover;
pub use registry::{MoverBridgeRegistry, RegistryError, TransferHandle};
