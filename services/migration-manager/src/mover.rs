// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Pool-facing collaborators: mover layers and the control channel
//!
//! A mover layer starts and aborts one side of a transfer on a pool. The
//! control channel carries liveness messages to pools. Both have in-process
//! implementations backed by `pool_mover`, used when the engine runs next
//! to its pools.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use migration_types::{CorrelationId, LivenessMessage, PoolName, TransferRefusal, TransferRequest};
use pool_mover::{LivenessResponder, PoolMover};

#[async_trait]
pub trait MoverLayer: Send + Sync {
    /// Start this pool's side of a transfer
    async fn start_transfer(&self, request: &TransferRequest) -> Result<(), TransferRefusal>;

    /// Best-effort abort; unknown ids are ignored
    async fn abort(&self, correlation_id: &CorrelationId);
}

#[async_trait]
impl MoverLayer for PoolMover {
    async fn start_transfer(&self, request: &TransferRequest) -> Result<(), TransferRefusal> {
        self.accept(request).await.map(|_| ())
    }

    async fn abort(&self, correlation_id: &CorrelationId) {
        PoolMover::abort(self, correlation_id).await;
    }
}

/// Mover layers by pool name
#[derive(Default)]
pub struct MoverDirectory {
    movers: RwLock<HashMap<PoolName, Arc<dyn MoverLayer>>>,
}

impl MoverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the mover layer of a pool
    pub async fn insert(&self, pool: impl Into<PoolName>, mover: Arc<dyn MoverLayer>) {
        self.movers.write().await.insert(pool.into(), mover);
    }

    /// Forget a pool's mover layer
    pub async fn remove(&self, pool: &str) -> Option<Arc<dyn MoverLayer>> {
        self.movers.write().await.remove(pool)
    }

    pub async fn get(&self, pool: &str) -> Option<Arc<dyn MoverLayer>> {
        self.movers.read().await.get(pool).cloned()
    }

    /// Start a transfer on a pool; an unknown pool counts as unreachable
    pub async fn start(&self, pool: &str, request: &TransferRequest) -> Result<(), TransferRefusal> {
        match self.get(pool).await {
            Some(mover) => mover.start_transfer(request).await,
            None => Err(TransferRefusal::Unreachable(format!(
                "no mover layer for pool {}",
                pool
            ))),
        }
    }

    /// Abort a transfer on a pool, if the pool is known
    pub async fn abort(&self, pool: &str, correlation_id: &CorrelationId) {
        match self.get(pool).await {
            Some(mover) => mover.abort(correlation_id).await,
            None => debug!(pool = %pool, correlation_id = %correlation_id, "Abort for unknown pool"),
        }
    }
}

/// Pool-to-pool control channel used for liveness messages
///
/// Delivery is fire-and-forget; messages may be lost or reordered.
#[async_trait]
pub trait ControlChannel: Send + Sync {
    async fn send(&self, pool: &str, message: LivenessMessage);
}

/// Control channel to pools in the same process
///
/// Pings are answered by the target pool's responder; the pongs come out of
/// the receiver returned by `new`, to be fed back to the engine.
pub struct LocalControlChannel {
    responders: RwLock<HashMap<PoolName, LivenessResponder>>,
    replies: mpsc::UnboundedSender<LivenessMessage>,
}

impl LocalControlChannel {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<LivenessMessage>) {
        let (replies, replies_rx) = mpsc::unbounded_channel();
        let channel = Self {
            responders: RwLock::new(HashMap::new()),
            replies,
        };
        (channel, replies_rx)
    }

    /// Attach a pool's liveness responder
    pub async fn add_pool(&self, pool: impl Into<PoolName>, responder: LivenessResponder) {
        self.responders.write().await.insert(pool.into(), responder);
    }

    /// Detach a pool; messages to it are dropped afterwards
    pub async fn remove_pool(&self, pool: &str) {
        self.responders.write().await.remove(pool);
    }
}

#[async_trait]
impl ControlChannel for LocalControlChannel {
    async fn send(&self, pool: &str, message: LivenessMessage) {
        let responder = self.responders.read().await.get(pool).cloned();
        let Some(responder) = responder else {
            warn!(pool = %pool, "No route to pool, dropping liveness message");
            return;
        };

        if let Some(reply) = responder.handle_message(message).await {
            // Intentionally ignore send error - the engine may have shut down
            let _ = self.replies.send(reply);
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use migration_types::{ReplicaDescriptor, TransferRole};
    use pool_mover::config::PoolConfig;
    use uuid::Uuid;

    fn request(role: TransferRole) -> TransferRequest {
        TransferRequest {
            correlation_id: Uuid::new_v4(),
            replica: ReplicaDescriptor {
                id: "r1".to_string(),
                size_bytes: 10,
                ..Default::default()
            },
            role,
            peer: "pool_a".to_string(),
        }
    }

    #[tokio::test]
    async fn unknown_pool_is_unreachable() {
        let directory = MoverDirectory::new();
        let err = directory
            .start("pool_x", &request(TransferRole::Destination))
            .await
            .unwrap_err();
        assert!(matches!(err, TransferRefusal::Unreachable(_)));

        // Abort on an unknown pool is a no-op
        directory.abort("pool_x", &Uuid::new_v4()).await;
    }

    #[tokio::test]
    async fn pool_mover_as_mover_layer() {
        let (pool, _events) = PoolMover::new(PoolConfig::new("pool_b", 100));
        let pool = Arc::new(pool);
        let directory = MoverDirectory::new();
        directory.insert("pool_b", pool.clone()).await;

        let req = request(TransferRole::Destination);
        directory.start("pool_b", &req).await.unwrap();
        assert_eq!(pool.registry().len().await, 1);

        directory.abort("pool_b", &req.correlation_id).await;
        assert!(pool.registry().is_empty().await);
    }

    #[tokio::test]
    async fn local_channel_routes_pongs_back() {
        let (pool, _events) = PoolMover::new(PoolConfig::new("pool_b", 100));
        let req = request(TransferRole::Destination);
        pool.accept(&req).await.unwrap();

        let (channel, mut replies) = LocalControlChannel::new();
        channel
            .add_pool("pool_b", LivenessResponder::new(pool.registry()))
            .await;

        let ping = LivenessMessage::ping(req.correlation_id, "pool_a", "r1");
        channel.send("pool_b", ping.clone()).await;
        assert_eq!(
            replies.recv().await.unwrap(),
            LivenessMessage::Pong(ping.body().clone())
        );

        // Unknown transfer: silence
        channel
            .send("pool_b", LivenessMessage::ping(Uuid::new_v4(), "pool_a", "r1"))
            .await;
        // Unknown pool: dropped
        channel.send("pool_c", ping).await;
        assert!(replies.try_recv().is_err());
    }
}
