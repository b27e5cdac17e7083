// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Liveness responder
//!
//! Answers a ping with a pong carrying the same fields, but only while the
//! pinged transfer is registered on this pool. Silence is how the engine
//! learns a transfer is gone.

use std::sync::Arc;

use tracing::{debug, trace};

use migration_types::{LivenessMessage, PoolMigrationMessage};

use crate::metrics;
use crate::registry::MoverBridgeRegistry;

/// Pool-side ping handler
#[derive(Clone)]
pub struct LivenessResponder {
    registry: Arc<MoverBridgeRegistry>,
}

impl LivenessResponder {
    pub fn new(registry: Arc<MoverBridgeRegistry>) -> Self {
        Self { registry }
    }

    /// Handle a ping; returns the message to echo back as a pong, if any
    pub async fn handle_ping(&self, ping: &PoolMigrationMessage) -> Option<PoolMigrationMessage> {
        let known = match self.registry.lookup(&ping.correlation_id).await {
            Some(handle) => handle.replica.id == ping.replica_id,
            None => false,
        };

        if !known {
            debug!(
                pool = %self.registry.pool(),
                correlation_id = %ping.correlation_id,
                replica_id = %ping.replica_id,
                "Ignoring ping for unknown transfer"
            );
            metrics::record_ping_ignored();
            return None;
        }

        self.registry.touch(&ping.correlation_id).await;
        trace!(
            pool = %self.registry.pool(),
            correlation_id = %ping.correlation_id,
            "Answering ping"
        );
        metrics::record_ping_answered();
        Some(ping.clone())
    }

    /// Handle any control channel message
    pub async fn handle_message(&self, message: LivenessMessage) -> Option<LivenessMessage> {
        match message {
            LivenessMessage::Ping(ping) => self.handle_ping(&ping).await.map(LivenessMessage::Pong),
            // Pongs are for the engine
            LivenessMessage::Pong(_) => None,
        }
    }
}
