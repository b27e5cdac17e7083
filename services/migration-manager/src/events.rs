// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Event routing into task state machines
//!
//! Mover callbacks and pongs arrive from pools as plain messages. The router
//! hands each one to the task attempt that owns its correlation id, in
//! delivery order. Messages for ids no longer routed are stale and dropped.

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use tracing::debug;

use migration_types::{CorrelationId, PoolMigrationMessage, TransferEvent};

use crate::metrics;

/// Event delivered to a task attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskEvent {
    /// Completion or failure reported by a pool's mover
    Transfer(TransferEvent),
    /// Liveness reply from the remote pool
    Pong(PoolMigrationMessage),
}

impl TaskEvent {
    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            TaskEvent::Transfer(e) => e.correlation_id,
            TaskEvent::Pong(m) => m.correlation_id,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            TaskEvent::Transfer(_) => "transfer",
            TaskEvent::Pong(_) => "pong",
        }
    }
}

/// Correlation id -> task attempt inbox
#[derive(Default)]
pub struct EventRouter {
    routes: RwLock<HashMap<CorrelationId, mpsc::UnboundedSender<TaskEvent>>>,
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open an inbox for a correlation id
    ///
    /// An id that is already routed gets a fresh inbox; the old one sees
    /// no further events.
    pub async fn register(
        &self,
        correlation_id: CorrelationId,
    ) -> mpsc::UnboundedReceiver<TaskEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.write().await.insert(correlation_id, tx);
        rx
    }

    /// Close an inbox; later events for the id are stale
    pub async fn unregister(&self, correlation_id: &CorrelationId) {
        self.routes.write().await.remove(correlation_id);
    }

    /// Deliver an event; returns false if it was stale
    pub async fn deliver(&self, event: TaskEvent) -> bool {
        let correlation_id = event.correlation_id();
        let kind = event.kind();

        let delivered = match self.routes.read().await.get(&correlation_id) {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        };

        if !delivered {
            debug!(
                correlation_id = %correlation_id,
                kind,
                "Discarding event for untracked correlation id"
            );
            metrics::record_stale_event(kind);
        }
        delivered
    }

    /// Number of open inboxes
    pub async fn len(&self) -> usize {
        self.routes.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.routes.read().await.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use migration_types::{TransferEventKind, TransferRole};
    use uuid::Uuid;

    fn pong(id: CorrelationId) -> TaskEvent {
        TaskEvent::Pong(PoolMigrationMessage {
            correlation_id: id,
            pool: "pool_a".to_string(),
            replica_id: "r1".to_string(),
        })
    }

    fn completed(id: CorrelationId) -> TaskEvent {
        TaskEvent::Transfer(TransferEvent {
            correlation_id: id,
            pool: "pool_b".to_string(),
            role: TransferRole::Destination,
            kind: TransferEventKind::Completed {
                bytes_transferred: 1,
            },
        })
    }

    #[tokio::test]
    async fn routes_by_correlation_id_in_order() {
        let router = EventRouter::new();
        let u1 = Uuid::new_v4();
        let u2 = Uuid::new_v4();
        let mut rx1 = router.register(u1).await;
        let mut rx2 = router.register(u2).await;

        assert!(router.deliver(pong(u1)).await);
        assert!(router.deliver(completed(u1)).await);
        assert!(router.deliver(pong(u2)).await);

        assert_eq!(rx1.recv().await.unwrap(), pong(u1));
        assert_eq!(rx1.recv().await.unwrap(), completed(u1));
        assert_eq!(rx2.recv().await.unwrap(), pong(u2));
        assert!(rx1.try_recv().is_err());
    }

    #[tokio::test]
    async fn stale_events_are_discarded() {
        let router = EventRouter::new();
        let u1 = Uuid::new_v4();
        let mut rx = router.register(u1).await;
        router.unregister(&u1).await;

        assert!(!router.deliver(pong(u1)).await);
        assert!(!router.deliver(completed(Uuid::new_v4())).await);
        assert!(router.is_empty().await);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn dropped_inbox_counts_as_stale() {
        let router = EventRouter::new();
        let u1 = Uuid::new_v4();
        drop(router.register(u1).await);

        assert!(!router.deliver(pong(u1)).await);
        assert_eq!(router.len().await, 1);
    }
}
