// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

//! Mover bridge registry
//!
//! Per-pool table of in-flight transfers keyed by correlation id. The
//! migration engine registers and removes entries; the byte mover reports
//! writes, completion and failure; the liveness responder looks entries up.
//!
//! Completion and failure are published on an event stream so the engine
//! learns about them without the mover calling back into engine code.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};

use thiserror::Error;
use tokio::sync::{RwLock, mpsc};
use tokio::time::Instant;
use tracing::{debug, warn};

use migration_types::{
    CorrelationId, PoolName, ReplicaDescriptor, TransferEvent, TransferEventKind, TransferRole,
};

use crate::metrics;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Transfer already registered: {0}")]
    DuplicateTransfer(CorrelationId),
    #[error("No mover associated with transfer: {0}")]
    UnknownTransfer(CorrelationId),
    #[error("Transfer {0} is not open for writing")]
    WrongRole(CorrelationId),
}

/// Local execution context of one side of a transfer
#[derive(Debug, Clone)]
pub struct TransferHandle {
    /// Correlation id of the transfer attempt
    pub correlation_id: CorrelationId,
    /// Replica being transferred
    pub replica: ReplicaDescriptor,
    /// Role this pool plays
    pub role: TransferRole,
    /// Pool at the other end
    pub peer: PoolName,
    /// Data file backing the transfer
    pub data_path: PathBuf,
    /// Space allocated for incoming data
    pub allocated_bytes: u64,
    /// Bytes written or sent so far
    pub bytes_transferred: u64,
    /// Last time a ping or a write showed the transfer alive
    pub last_liveness: Instant,
    /// When the handle was registered
    pub started: Instant,
}

impl TransferHandle {
    /// Create a handle with nothing allocated or transferred yet
    pub fn new(
        correlation_id: CorrelationId,
        replica: ReplicaDescriptor,
        role: TransferRole,
        peer: PoolName,
        data_path: PathBuf,
    ) -> Self {
        let now = Instant::now();
        Self {
            correlation_id,
            replica,
            role,
            peer,
            data_path,
            allocated_bytes: 0,
            bytes_transferred: 0,
            last_liveness: now,
            started: now,
        }
    }
}

/// Concurrency-safe registry of the transfers one pool takes part in
pub struct MoverBridgeRegistry {
    pool: PoolName,
    allocation_increment: u64,
    transfers: RwLock<HashMap<CorrelationId, TransferHandle>>,
    committed_bytes: AtomicU64,
    events: mpsc::UnboundedSender<TransferEvent>,
}

impl MoverBridgeRegistry {
    /// Create a registry for a pool
    ///
    /// Returns the registry and the stream of completion/failure events.
    /// The stream is unbounded so mover callbacks never wait on the engine.
    pub fn new(
        pool: impl Into<PoolName>,
        allocation_increment: u64,
    ) -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
        let (events, events_rx) = mpsc::unbounded_channel();
        let registry = Self {
            pool: pool.into(),
            allocation_increment: allocation_increment.max(1),
            transfers: RwLock::new(HashMap::new()),
            committed_bytes: AtomicU64::new(0),
            events,
        };
        (registry, events_rx)
    }

    /// Name of the pool owning this registry
    pub fn pool(&self) -> &str {
        &self.pool
    }

    /// Register a new transfer
    pub async fn register(&self, handle: TransferHandle) -> Result<(), RegistryError> {
        let mut transfers = self.transfers.write().await;
        if transfers.contains_key(&handle.correlation_id) {
            return Err(RegistryError::DuplicateTransfer(handle.correlation_id));
        }
        debug!(
            pool = %self.pool,
            correlation_id = %handle.correlation_id,
            replica_id = %handle.replica.id,
            role = %handle.role,
            "Registered transfer"
        );
        transfers.insert(handle.correlation_id, handle);
        Ok(())
    }

    /// Look up a transfer
    pub async fn lookup(&self, correlation_id: &CorrelationId) -> Option<TransferHandle> {
        self.transfers.read().await.get(correlation_id).cloned()
    }

    /// Mark a transfer as alive; returns false if it is unknown
    pub async fn touch(&self, correlation_id: &CorrelationId) -> bool {
        let mut transfers = self.transfers.write().await;
        match transfers.get_mut(correlation_id) {
            Some(handle) => {
                handle.last_liveness = Instant::now();
                true
            }
            None => false,
        }
    }

    /// Account for a write of `count` bytes at `offset`
    ///
    /// Grows the allocation in fixed increments until it covers the write.
    /// Returns the allocation after the write.
    pub async fn record_write(
        &self,
        correlation_id: &CorrelationId,
        offset: u64,
        count: u64,
    ) -> Result<u64, RegistryError> {
        let mut transfers = self.transfers.write().await;
        let handle = transfers
            .get_mut(correlation_id)
            .ok_or(RegistryError::UnknownTransfer(*correlation_id))?;

        if handle.role != TransferRole::Destination {
            return Err(RegistryError::WrongRole(*correlation_id));
        }

        let end = offset.saturating_add(count);
        let needed = end
            .saturating_sub(handle.allocated_bytes)
            .div_ceil(self.allocation_increment);
        handle.allocated_bytes = handle
            .allocated_bytes
            .saturating_add(needed.saturating_mul(self.allocation_increment));

        handle.bytes_transferred = handle.bytes_transferred.saturating_add(count);
        handle.last_liveness = Instant::now();
        metrics::record_bytes_written(count);

        Ok(handle.allocated_bytes)
    }

    /// Mover callback: the transfer finished
    pub async fn complete(
        &self,
        correlation_id: &CorrelationId,
        bytes_transferred: u64,
    ) -> Result<TransferHandle, RegistryError> {
        let mut handle = self
            .transfers
            .write()
            .await
            .remove(correlation_id)
            .ok_or(RegistryError::UnknownTransfer(*correlation_id))?;
        handle.bytes_transferred = bytes_transferred;

        if handle.role == TransferRole::Destination {
            self.committed_bytes
                .fetch_add(handle.replica.size_bytes, Ordering::SeqCst);
        }

        debug!(
            pool = %self.pool,
            correlation_id = %correlation_id,
            bytes = bytes_transferred,
            "Transfer complete"
        );
        metrics::record_transfer("completed");
        self.publish(
            &handle,
            TransferEventKind::Completed { bytes_transferred },
        );
        Ok(handle)
    }

    /// Mover callback: the transfer failed
    pub async fn fail(
        &self,
        correlation_id: &CorrelationId,
        cause: impl Into<String>,
    ) -> Result<TransferHandle, RegistryError> {
        let handle = self
            .transfers
            .write()
            .await
            .remove(correlation_id)
            .ok_or(RegistryError::UnknownTransfer(*correlation_id))?;
        let cause = cause.into();

        warn!(
            pool = %self.pool,
            correlation_id = %correlation_id,
            cause = %cause,
            "Transfer failed"
        );
        metrics::record_transfer("failed");
        self.publish(&handle, TransferEventKind::Failed { cause });
        Ok(handle)
    }

    /// Drop a transfer without publishing an event
    pub async fn remove(&self, correlation_id: &CorrelationId) -> Option<TransferHandle> {
        self.transfers.write().await.remove(correlation_id)
    }

    /// Number of registered transfers
    pub async fn len(&self) -> usize {
        self.transfers.read().await.len()
    }

    /// Whether no transfer is registered
    pub async fn is_empty(&self) -> bool {
        self.transfers.read().await.is_empty()
    }

    /// Correlation ids of all registered transfers
    pub async fn active_ids(&self) -> Vec<CorrelationId> {
        self.transfers.read().await.keys().copied().collect()
    }

    /// Bytes held for incoming transfers that have not completed
    pub async fn reserved_bytes(&self) -> u64 {
        self.transfers
            .read()
            .await
            .values()
            .filter(|h| h.role == TransferRole::Destination)
            .map(|h| h.replica.size_bytes)
            .sum()
    }

    /// Bytes of incoming replicas completed since the registry was created
    pub fn committed_bytes(&self) -> u64 {
        self.committed_bytes.load(Ordering::SeqCst)
    }

    fn publish(&self, handle: &TransferHandle, kind: TransferEventKind) {
        let event = TransferEvent {
            correlation_id: handle.correlation_id,
            pool: self.pool.clone(),
            role: handle.role,
            kind,
        };
        // Intentionally ignore send error - nobody may be listening
        let _ = self.events.send(event);
    }
}
