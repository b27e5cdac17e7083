// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.
//
// Copyright 2026 Edgecast Cloud LLC.

// Allow expect/unwrap in tests - they provide clear panic messages on failure
#![allow(clippy::expect_used, clippy::unwrap_used)]

//! Integration tests for the pool side of a migration.
//!
//! Drives a source and a destination pool through a full transfer the way
//! the engine and the byte movers would: accept on both sides, ping while
//! data flows, report writes, complete, and check what each pool saw.

use std::sync::Arc;

use migration_types::{
    LivenessMessage, ReplicaDescriptor, TransferEventKind, TransferRefusal, TransferRequest,
    TransferRole,
};
use pool_mover::config::PoolConfig;
use pool_mover::{LivenessResponder, PoolMover};
use uuid::Uuid;

const MIB: u64 = 1024 * 1024;

// ============================================================================
// Test Infrastructure
// ============================================================================

struct TestPools {
    source: PoolMover,
    destination: PoolMover,
    destination_events: tokio::sync::mpsc::UnboundedReceiver<migration_types::TransferEvent>,
    responder: LivenessResponder,
}

impl TestPools {
    fn new(destination_capacity: u64) -> Self {
        let (source, _) = PoolMover::new(PoolConfig::new("pool_a", 1024 * MIB));
        let (destination, destination_events) =
            PoolMover::new(PoolConfig::new("pool_b", destination_capacity));
        let responder = LivenessResponder::new(destination.registry());
        Self {
            source,
            destination,
            destination_events,
            responder,
        }
    }
}

fn replica(id: &str, size: u64) -> ReplicaDescriptor {
    ReplicaDescriptor {
        id: id.to_string(),
        size_bytes: size,
        checksum: "1:feedface".to_string(),
        locations: vec!["pool_a".to_string()],
        storage_group: "disk".to_string(),
    }
}

fn requests(replica: &ReplicaDescriptor) -> (TransferRequest, TransferRequest) {
    let correlation_id = Uuid::new_v4();
    (
        TransferRequest {
            correlation_id,
            replica: replica.clone(),
            role: TransferRole::Destination,
            peer: "pool_a".to_string(),
        },
        TransferRequest {
            correlation_id,
            replica: replica.clone(),
            role: TransferRole::Source,
            peer: "pool_b".to_string(),
        },
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn full_transfer_lifecycle() {
    let mut pools = TestPools::new(1024 * MIB);
    let replica = replica("0000A1", 120 * MIB);
    let (dest_req, src_req) = requests(&replica);
    let id = dest_req.correlation_id;

    pools.destination.accept(&dest_req).await.unwrap();
    pools.source.accept(&src_req).await.unwrap();

    // Engine pings the destination while data flows
    let pong = pools
        .responder
        .handle_message(LivenessMessage::ping(id, "pool_a", "0000A1"))
        .await;
    assert!(matches!(pong, Some(LivenessMessage::Pong(_))));

    let registry = pools.destination.registry();
    let mut allocated = 0;
    for chunk in 0..3 {
        allocated = registry
            .record_write(&id, chunk * 40 * MIB, 40 * MIB)
            .await
            .unwrap();
    }
    assert_eq!(allocated, 150 * MIB);

    registry.complete(&id, 120 * MIB).await.unwrap();
    pools.source.abort(&id).await;

    let event = pools.destination_events.recv().await.unwrap();
    assert_eq!(event.correlation_id, id);
    assert_eq!(event.role, TransferRole::Destination);
    assert_eq!(
        event.kind,
        TransferEventKind::Completed {
            bytes_transferred: 120 * MIB
        }
    );

    // A finished transfer no longer answers pings
    let late = pools
        .responder
        .handle_message(LivenessMessage::ping(id, "pool_a", "0000A1"))
        .await;
    assert!(late.is_none());
}

#[tokio::test]
async fn aborted_destination_stops_answering() {
    let pools = TestPools::new(1024 * MIB);
    let replica = replica("0000A2", MIB);
    let (dest_req, _) = requests(&replica);
    let id = dest_req.correlation_id;

    pools.destination.accept(&dest_req).await.unwrap();
    assert!(pools.destination.abort(&id).await);

    let pong = pools
        .responder
        .handle_message(LivenessMessage::ping(id, "pool_a", "0000A2"))
        .await;
    assert!(pong.is_none());
}

#[tokio::test]
async fn concurrent_acceptance_never_overcommits() {
    let (destination, _events) = PoolMover::new(PoolConfig::new("pool_b", 100 * MIB));
    let destination = Arc::new(destination);

    let mut handles = Vec::new();
    for i in 0..10 {
        let destination = Arc::clone(&destination);
        handles.push(tokio::spawn(async move {
            let replica = replica(&format!("R{}", i), 30 * MIB);
            let (dest_req, _) = requests(&replica);
            destination.accept(&dest_req).await
        }));
    }

    let mut accepted = 0;
    let mut refused = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => accepted += 1,
            Err(TransferRefusal::InsufficientSpace { .. }) => refused += 1,
            Err(other) => panic!("unexpected refusal: {}", other),
        }
    }

    assert_eq!(accepted, 3);
    assert_eq!(refused, 7);
    assert_eq!(destination.free_bytes().await, 10 * MIB);
}
