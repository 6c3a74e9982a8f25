//! Closed timestamp provider tests
//!
//! Test Categories:
//! 1. Monotonicity within a (node, range, epoch)
//! 2. Epoch isolation across lease changes
//! 3. Eviction and concurrent forwarding

use std::sync::Arc;
use std::thread;

use rangekv::closedts::{ClosedTimestampProvider, Entry, ForwardOutcome, ShardedStorage};
use rangekv::hlc::Timestamp;
use rangekv::lease::{Epoch, Lai, NodeId, RangeId};

const NODE: NodeId = NodeId(2);
const RANGE: RangeId = RangeId(7);

fn entry(epoch: i64, lai: u64, closed: Timestamp) -> Entry {
    Entry::new(NODE, RANGE, Epoch(epoch), Lai(lai), closed)
}

fn max_closed(storage: &ShardedStorage, epoch: i64, lai: u64) -> Timestamp {
    storage.max_closed(NODE, RANGE, Epoch(epoch), Lai(lai))
}

// =============================================================================
// MONOTONICITY
// =============================================================================

/// Test: Successive forwards never lower the answer for non-decreasing
/// LAI queries, whatever order the updates arrive in.
#[test]
fn test_max_closed_monotonic_under_reordering() {
    let storage = ShardedStorage::default();
    let updates = [
        (3, 30),
        (1, 10),
        (5, 50),
        (4, 45),
        (5, 40),
        (2, 60),
        (8, 80),
        (8, 85),
        (6, 70),
    ];

    let mut last = Timestamp::ZERO;
    for (lai, wall) in updates {
        storage.forward(entry(5, lai, Timestamp::from_wall(wall)));
        let stored_lai = storage.entry(NODE, RANGE).unwrap().lai.0;

        // Query at the stored LAI, which only ever grows.
        let now = max_closed(&storage, 5, stored_lai);
        assert!(
            now >= last,
            "regressed from {} to {} after lai={} wall={}",
            last,
            now,
            lai,
            wall
        );
        last = now;
    }
    assert_eq!(last, Timestamp::from_wall(85));
}

/// Test: A query beyond the stored LAI is unknown rather than optimistic.
#[test]
fn test_query_ahead_of_stored_lai_is_unknown() {
    let storage = ShardedStorage::default();
    storage.forward(entry(5, 10, Timestamp::from_wall(100)));
    assert_eq!(max_closed(&storage, 5, 10), Timestamp::from_wall(100));
    assert_eq!(max_closed(&storage, 5, 11), Timestamp::ZERO);
}

// =============================================================================
// EPOCH ISOLATION
// =============================================================================

/// Test: After an epoch change, entries from the old epoch are ignored even
/// when their timestamp is larger.
#[test]
fn test_new_epoch_ignores_old_watermarks() {
    let storage = ShardedStorage::default();
    storage.forward(entry(5, 10, Timestamp::from_wall(900)));
    assert_eq!(max_closed(&storage, 6, 1), Timestamp::ZERO);

    assert_eq!(
        storage.forward(entry(6, 1, Timestamp::from_wall(100))),
        ForwardOutcome::Superseded { previous: Epoch(5) }
    );
    assert_eq!(max_closed(&storage, 6, 1), Timestamp::from_wall(100));
    assert_eq!(max_closed(&storage, 5, 10), Timestamp::ZERO);
}

/// Test: Late entries from an older epoch cannot displace the newer one.
#[test]
fn test_late_old_epoch_entry_is_stale() {
    let storage = ShardedStorage::default();
    storage.forward(entry(6, 1, Timestamp::from_wall(100)));
    assert_eq!(
        storage.forward(entry(5, 50, Timestamp::from_wall(5000))),
        ForwardOutcome::Stale
    );
    assert_eq!(max_closed(&storage, 6, 1), Timestamp::from_wall(100));
}

// =============================================================================
// EVICTION AND CONCURRENCY
// =============================================================================

/// Test: Evicting a node forgets only that node's watermarks.
#[test]
fn test_evict_node_is_scoped() {
    let storage = ShardedStorage::new(4);
    storage.forward(entry(5, 1, Timestamp::from_wall(100)));
    storage.forward(Entry::new(
        NodeId(3),
        RANGE,
        Epoch(2),
        Lai(1),
        Timestamp::from_wall(100),
    ));

    assert_eq!(storage.evict_node(NODE), 1);
    assert_eq!(max_closed(&storage, 5, 1), Timestamp::ZERO);
    assert_eq!(
        storage.max_closed(NodeId(3), RANGE, Epoch(2), Lai(1)),
        Timestamp::from_wall(100)
    );
}

/// Test: Concurrent writers on many ranges end with every range at its
/// highest watermark.
#[test]
fn test_concurrent_forwarding() {
    let storage = Arc::new(ShardedStorage::default());
    let mut handles = Vec::new();

    for worker in 0..4u64 {
        let storage = Arc::clone(&storage);
        handles.push(thread::spawn(move || {
            for range in 0..32u64 {
                for lai in 1..=50u64 {
                    let wall = (lai * 10 + worker) as i64;
                    storage.forward(Entry::new(
                        NODE,
                        RangeId(range),
                        Epoch(1),
                        Lai(lai),
                        Timestamp::from_wall(wall),
                    ));
                }
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(storage.len(), 32);
    for range in 0..32u64 {
        let stored = storage.entry(NODE, RangeId(range)).unwrap();
        assert_eq!(stored.lai, Lai(50));
        assert!(stored.closed >= Timestamp::from_wall(500));
    }
}
