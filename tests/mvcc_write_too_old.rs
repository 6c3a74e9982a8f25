//! MVCC write ordering tests
//!
//! A write at or below the newest committed version of a key is never
//! silently reordered: it is applied one logical tick past the newest
//! conflicting version and reported as `WriteTooOldError`.
//!
//! Test Categories:
//! 1. Write-too-old round trip
//! 2. Logical bump amount over several history shapes
//! 3. Snapshot reads around bumped writes

use std::sync::Arc;

use rangekv::hlc::Timestamp;
use rangekv::mvcc::{Key, MvccError, MvccStore, Value, VersionPayload};
use rangekv::observability::MetricsRegistry;

fn ts(wall: i64) -> Timestamp {
    Timestamp::from_wall(wall)
}

fn key() -> Key {
    Key::from("a")
}

// =============================================================================
// WRITE-TOO-OLD ROUND TRIP
// =============================================================================

/// Test: A value written below an existing version is bumped past it.
#[test]
fn test_put_below_existing_is_bumped() {
    let store = MvccStore::new();
    assert_eq!(store.put(key(), ts(44), Value::from("v44")), Ok(ts(44)));

    let err = store.put(key(), ts(33), Value::from("v33")).unwrap_err();
    let wto = err.as_write_too_old().expect("write too old");
    assert_eq!(wto.timestamp, ts(33));
    assert_eq!(wto.existing_timestamp, ts(44));
    assert_eq!(wto.actual_timestamp, Timestamp::new(44, 1));
    assert!(err.is_retryable());

    // The version at 44.0 is untouched.
    let at_44 = store.get(&key(), ts(44)).unwrap().unwrap();
    assert_eq!(at_44.timestamp(), ts(44));
    assert_eq!(at_44.payload().value(), Some(&Value::from("v44")));
}

/// Test: A tombstone written below an existing version follows the same rule.
#[test]
fn test_delete_below_existing_is_bumped() {
    let store = MvccStore::new();
    store.put(key(), ts(44), Value::from("v44")).unwrap();

    let err = store.delete(key(), ts(33)).unwrap_err();
    let wto = err.as_write_too_old().expect("write too old");
    assert_eq!(wto.actual_timestamp, Timestamp::new(44, 1));

    let versions = store.versions(&key());
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0].timestamp(), ts(44));
    assert_eq!(versions[1].timestamp(), Timestamp::new(44, 1));
    assert_eq!(versions[1].payload(), &VersionPayload::Tombstone);
}

/// Test: Retrying the same write at the reported timestamp succeeds.
#[test]
fn test_retry_at_actual_timestamp_succeeds() {
    let store = MvccStore::new();
    store.put(key(), ts(44), Value::from("v44")).unwrap();

    let actual = match store.put(key(), ts(33), Value::from("v33")) {
        Err(MvccError::WriteTooOld(wto)) => wto.actual_timestamp,
        other => panic!("expected write too old, got {:?}", other),
    };

    assert_eq!(store.put(key(), actual, Value::from("v33")), Ok(actual));
    assert_eq!(store.versions(&key()).len(), 2);
}

/// Test: Every conflict is counted.
#[test]
fn test_conflicts_are_counted() {
    let metrics = Arc::new(MetricsRegistry::new());
    let store = MvccStore::with_metrics(Arc::clone(&metrics));
    store.put(key(), ts(44), Value::from("v")).unwrap();
    let _ = store.put(key(), ts(10), Value::from("x"));
    let _ = store.delete(key(), ts(20));

    assert_eq!(metrics.snapshot().write_too_old_conflicts, 2);
}

// =============================================================================
// LOGICAL BUMP AMOUNT
// =============================================================================

/// Test: The bump lands one logical tick past the newest committed
/// version, whatever the shape of the history below it.
#[test]
fn test_bump_is_one_past_newest_version() {
    let cases: Vec<(Vec<Timestamp>, Timestamp, Timestamp)> = vec![
        // (history, write, expected actual)
        (vec![ts(44)], ts(33), Timestamp::new(44, 1)),
        (vec![ts(44)], ts(44), Timestamp::new(44, 1)),
        (vec![Timestamp::new(44, 7)], ts(44), Timestamp::new(44, 8)),
        (vec![ts(10), ts(44), Timestamp::new(50, 3)], ts(33), Timestamp::new(50, 4)),
        (vec![ts(10), ts(20), ts(30)], ts(25), Timestamp::new(30, 1)),
    ];

    for (history, write, expected) in cases {
        let store = MvccStore::new();
        for (i, at) in history.iter().enumerate() {
            store
                .put(key(), *at, Value::new(vec![i as u8]))
                .expect("history write");
        }

        let err = store.put(key(), write, Value::from("w")).unwrap_err();
        let wto = err.as_write_too_old().expect("write too old");
        assert_eq!(
            wto.actual_timestamp, expected,
            "history {:?} write {}",
            history, write
        );
        assert_eq!(wto.existing_timestamp, *history.last().unwrap());
    }
}

/// Test: The logical counter carries into the wall time when exhausted.
#[test]
fn test_bump_carries_at_logical_max() {
    let store = MvccStore::new();
    store
        .put(key(), Timestamp::new(44, i32::MAX), Value::from("v"))
        .unwrap();

    let err = store.put(key(), ts(44), Value::from("w")).unwrap_err();
    assert_eq!(
        err.as_write_too_old().unwrap().actual_timestamp,
        Timestamp::new(45, 0)
    );
}

/// Test: Rewriting an older version's exact payload at its timestamp is
/// still a conflict when a newer version exists.
#[test]
fn test_matching_old_payload_is_not_a_replay() {
    let store = MvccStore::new();
    store.put(key(), ts(10), Value::from("x")).unwrap();
    store.put(key(), ts(20), Value::from("y")).unwrap();

    let err = store.put(key(), ts(10), Value::from("x")).unwrap_err();
    let wto = err.as_write_too_old().expect("write too old");
    assert_eq!(wto.existing_timestamp, ts(20));
    assert_eq!(wto.actual_timestamp, Timestamp::new(20, 1));

    let latest = store.get(&key(), ts(100)).unwrap().unwrap();
    assert_eq!(latest.timestamp(), Timestamp::new(20, 1));
    assert_eq!(latest.payload().value(), Some(&Value::from("x")));
}

/// Test: With no timestamp left above the newest version, the write is
/// refused and nothing is stored.
#[test]
fn test_conflict_at_top_of_range_is_refused() {
    let store = MvccStore::new();
    store.put(key(), Timestamp::MAX, Value::from("v")).unwrap();

    let err = store.put(key(), ts(44), Value::from("w")).unwrap_err();
    assert!(matches!(
        err,
        MvccError::TimestampExhausted { existing_timestamp, .. }
            if existing_timestamp == Timestamp::MAX
    ));
    assert!(!err.is_retryable());
    assert_eq!(store.versions(&key()).len(), 1);

    // One below the top still has room for the bump.
    let store = MvccStore::new();
    let below = Timestamp::new(i64::MAX, i32::MAX - 1);
    store.put(key(), below, Value::from("v")).unwrap();
    let err = store.put(key(), below, Value::from("w")).unwrap_err();
    assert_eq!(err.as_write_too_old().unwrap().actual_timestamp, Timestamp::MAX);
}

/// Test: A write strictly above every version is not a conflict.
#[test]
fn test_write_above_history_is_clean() {
    let store = MvccStore::new();
    store.put(key(), ts(44), Value::from("v")).unwrap();
    assert_eq!(
        store.put(key(), Timestamp::new(44, 1), Value::from("w")),
        Ok(Timestamp::new(44, 1))
    );
}

// =============================================================================
// SNAPSHOT READS
// =============================================================================

/// Test: Reads never observe versions above the read timestamp, including
/// bumped writes.
#[test]
fn test_reads_do_not_observe_bumped_write_below_it() {
    let store = MvccStore::new();
    store.put(key(), ts(44), Value::from("v44")).unwrap();
    let _ = store.put(key(), ts(33), Value::from("v33"));

    assert!(store.get(&key(), ts(33)).unwrap().is_none());
    assert_eq!(
        store.get(&key(), ts(44)).unwrap().unwrap().payload().value(),
        Some(&Value::from("v44"))
    );
    assert_eq!(
        store
            .get(&key(), Timestamp::new(44, 1))
            .unwrap()
            .unwrap()
            .payload()
            .value(),
        Some(&Value::from("v33"))
    );
}
