// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2020 Joyent, Inc.
// Copyright 2026 Edgecast Cloud LLC.

//! Transfer acceptance
//!
//! Decides whether this pool takes part in a transfer. A destination must
//! have room for the replica after accounting for space already promised to
//! other incoming transfers; a disabled pool takes nothing.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::{Mutex, mpsc};
use tracing::{info, warn};

use migration_types::{
    CorrelationId, TransferEvent, TransferRefusal, TransferRequest, TransferRole,
};

use crate::config::PoolConfig;
use crate::metrics;
use crate::registry::{MoverBridgeRegistry, RegistryError, TransferHandle};

/// Pool-side entry point for starting and aborting transfers
pub struct PoolMover {
    config: PoolConfig,
    registry: Arc<MoverBridgeRegistry>,
    accepting: AtomicBool,
    /// Serializes the space check with registration
    admission: Mutex<()>,
}

impl PoolMover {
    /// Create a mover for a pool
    ///
    /// Returns the mover and the pool's transfer event stream.
    pub fn new(config: PoolConfig) -> (Self, mpsc::UnboundedReceiver<TransferEvent>) {
        let (registry, events) =
            MoverBridgeRegistry::new(config.pool_name.clone(), config.allocation_increment_bytes);
        let mover = Self {
            accepting: AtomicBool::new(config.accepting),
            config,
            registry: Arc::new(registry),
            admission: Mutex::new(()),
        };
        (mover, events)
    }

    /// Name of this pool
    pub fn pool_name(&self) -> &str {
        &self.config.pool_name
    }

    /// Registry of this pool's transfers
    pub fn registry(&self) -> Arc<MoverBridgeRegistry> {
        Arc::clone(&self.registry)
    }

    /// Enable or disable acceptance of new transfers
    pub fn set_accepting(&self, accepting: bool) {
        self.accepting.store(accepting, Ordering::SeqCst);
    }

    /// Whether new transfers are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }

    /// Bytes still available to incoming transfers
    pub async fn free_bytes(&self) -> u64 {
        self.config
            .capacity_bytes
            .saturating_sub(self.config.used_bytes)
            .saturating_sub(self.registry.committed_bytes())
            .saturating_sub(self.registry.reserved_bytes().await)
    }

    /// Start this pool's side of a transfer
    ///
    /// On success the transfer is registered under its correlation id and
    /// the new handle is returned.
    pub async fn accept(&self, request: &TransferRequest) -> Result<TransferHandle, TransferRefusal> {
        let _admission = self.admission.lock().await;

        if !self.is_accepting() {
            metrics::record_transfer("refused");
            return Err(TransferRefusal::NotAccepting);
        }

        if request.role == TransferRole::Destination {
            let available = self.free_bytes().await;
            if request.replica.size_bytes > available {
                warn!(
                    pool = %self.config.pool_name,
                    correlation_id = %request.correlation_id,
                    replica_id = %request.replica.id,
                    needed = request.replica.size_bytes,
                    available,
                    "Refusing transfer: insufficient space"
                );
                metrics::record_transfer("refused");
                return Err(TransferRefusal::InsufficientSpace {
                    needed: request.replica.size_bytes,
                    available,
                });
            }
        }

        let handle = TransferHandle::new(
            request.correlation_id,
            request.replica.clone(),
            request.role,
            request.peer.clone(),
            self.config.replica_path(&request.replica.id),
        );

        match self.registry.register(handle.clone()).await {
            Ok(()) => {}
            Err(RegistryError::DuplicateTransfer(_)) => {
                metrics::record_transfer("refused");
                return Err(TransferRefusal::Duplicate);
            }
            Err(e) => {
                metrics::record_transfer("refused");
                return Err(TransferRefusal::Unreachable(e.to_string()));
            }
        }

        info!(
            pool = %self.config.pool_name,
            correlation_id = %request.correlation_id,
            replica_id = %request.replica.id,
            role = %request.role,
            peer = %request.peer,
            "Accepted transfer"
        );
        metrics::record_transfer("accepted");
        Ok(handle)
    }

    /// Abort this pool's side of a transfer
    ///
    /// Unknown correlation ids are ignored; returns whether anything was
    /// aborted. No event is published for an aborted transfer.
    pub async fn abort(&self, correlation_id: &CorrelationId) -> bool {
        match self.registry.remove(correlation_id).await {
            Some(handle) => {
                info!(
                    pool = %self.config.pool_name,
                    correlation_id = %correlation_id,
                    replica_id = %handle.replica.id,
                    "Aborted transfer"
                );
                metrics::record_transfer("aborted");
                true
            }
            None => false,
        }
    }
}
