//! In-memory MVCC store enforcing per-key timestamp ordering
//!
//! Each key holds an ordered history of committed versions plus at most one
//! provisional intent. Committed versions of a key never share a timestamp.
//!
//! A write at or below the newest committed version is not rejected: it is
//! applied one logical tick past that version and reported as a
//! `WriteTooOldError` carrying the timestamp actually used. If no timestamp
//! exists past that version the write is refused instead.

use std::collections::BTreeMap;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use super::errors::{MvccError, MvccResult, WriteIntentError, WriteTooOldError};
use super::version::{IntentMeta, Key, Value, Version, VersionPayload};
use crate::hlc::Timestamp;
use crate::observability::MetricsRegistry;

#[derive(Debug, Default)]
struct KeyHistory {
    committed: BTreeMap<Timestamp, VersionPayload>,
    intent: Option<(Timestamp, VersionPayload, IntentMeta)>,
}

impl KeyHistory {
    fn latest_committed(&self) -> Option<Timestamp> {
        self.committed.keys().next_back().copied()
    }

    /// Newest conflicting version and the timestamp a write requested at
    /// `ts` must land at instead, if it conflicts.
    fn conflict(
        &self,
        key: &Key,
        ts: Timestamp,
    ) -> MvccResult<Option<(Timestamp, Timestamp)>> {
        let Some(latest) = self.latest_committed().filter(|latest| *latest >= ts) else {
            return Ok(None);
        };
        let actual = latest.next().ok_or_else(|| MvccError::TimestampExhausted {
            key: key.clone(),
            existing_timestamp: latest,
        })?;
        Ok(Some((latest, actual)))
    }

    fn foreign_intent(&self, key: &Key, txn_id: Option<Uuid>) -> Option<WriteIntentError> {
        match &self.intent {
            Some((ts, _, meta)) if Some(meta.txn_id) != txn_id => Some(WriteIntentError {
                key: key.clone(),
                txn_id: meta.txn_id,
                intent_timestamp: *ts,
            }),
            _ => None,
        }
    }
}

/// MVCC store for a single range.
#[derive(Debug, Default)]
pub struct MvccStore {
    keys: RwLock<BTreeMap<Key, KeyHistory>>,
    metrics: Option<Arc<MetricsRegistry>>,
}

impl MvccStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that counts write-too-old conflicts in `metrics`.
    pub fn with_metrics(metrics: Arc<MetricsRegistry>) -> Self {
        Self {
            keys: RwLock::default(),
            metrics: Some(metrics),
        }
    }

    /// Writes a committed value.
    ///
    /// On conflict the value is stored at `actual_timestamp` of the returned
    /// `WriteTooOldError`.
    pub fn put(&self, key: Key, ts: Timestamp, value: Value) -> MvccResult<Timestamp> {
        self.write_committed(key, ts, VersionPayload::Value(value))
    }

    /// Writes a committed tombstone. Same conflict rules as `put`.
    pub fn delete(&self, key: Key, ts: Timestamp) -> MvccResult<Timestamp> {
        self.write_committed(key, ts, VersionPayload::Tombstone)
    }

    fn write_committed(
        &self,
        key: Key,
        ts: Timestamp,
        payload: VersionPayload,
    ) -> MvccResult<Timestamp> {
        validate_write(&key, ts)?;

        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let history = keys.entry(key.clone()).or_default();

        if let Some(err) = history.foreign_intent(&key, None) {
            return Err(err.into());
        }

        // Replaying the newest write is a no-op. An equal payload further
        // down the history is still a conflict.
        if history.latest_committed() == Some(ts)
            && history.committed.get(&ts) == Some(&payload)
        {
            return Ok(ts);
        }

        match history.conflict(&key, ts)? {
            Some((existing, actual)) => {
                history.committed.insert(actual, payload);
                drop(keys);
                Err(self.write_too_old(key, ts, existing, actual))
            }
            None => {
                history.committed.insert(ts, payload);
                Ok(ts)
            }
        }
    }

    /// Lays down a provisional write for `txn`.
    ///
    /// A transaction may rewrite its own intent. Another transaction's
    /// intent blocks the write. Conflicts with committed versions follow the
    /// same bump-and-report rule as `put`.
    pub fn put_intent(
        &self,
        key: Key,
        ts: Timestamp,
        payload: VersionPayload,
        txn: IntentMeta,
    ) -> MvccResult<Timestamp> {
        validate_write(&key, ts)?;

        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let history = keys.entry(key.clone()).or_default();

        if let Some(err) = history.foreign_intent(&key, Some(txn.txn_id)) {
            return Err(err.into());
        }

        match history.conflict(&key, ts)? {
            Some((existing, actual)) => {
                history.intent = Some((actual, payload, txn));
                drop(keys);
                Err(self.write_too_old(key, ts, existing, actual))
            }
            None => {
                history.intent = Some((ts, payload, txn));
                Ok(ts)
            }
        }
    }

    /// Commits or drops the intent `txn_id` holds on `key`.
    ///
    /// With `commit = Some(ts)` the intent becomes a committed version at the
    /// later of its own timestamp and `ts`, and that timestamp is returned.
    /// With `None` the intent is discarded.
    pub fn resolve_intent(
        &self,
        key: &Key,
        txn_id: Uuid,
        commit: Option<Timestamp>,
    ) -> MvccResult<Option<Timestamp>> {
        let mut keys = self.keys.write().unwrap_or_else(PoisonError::into_inner);
        let not_found = || MvccError::IntentNotFound {
            key: key.clone(),
            txn_id,
        };
        let history = keys.get_mut(key).ok_or_else(not_found)?;

        let owned = matches!(&history.intent, Some((_, _, meta)) if meta.txn_id == txn_id);
        if !owned {
            return Err(not_found());
        }
        let Some((intent_ts, payload, _)) = history.intent.take() else {
            return Err(not_found());
        };

        let Some(commit_ts) = commit else {
            return Ok(None);
        };
        let mut ts = intent_ts;
        ts.forward(commit_ts);
        // Intents block committed writes, so nothing can sit at or above ts.
        debug_assert!(matches!(history.conflict(key, ts), Ok(None)));
        history.committed.insert(ts, payload);
        Ok(Some(ts))
    }

    /// Reads the newest committed version at or below `ts`.
    ///
    /// Tombstones read as `None`. An intent at or below `ts` is a conflict.
    pub fn get(&self, key: &Key, ts: Timestamp) -> MvccResult<Option<Version>> {
        self.read(key, ts, None)
    }

    /// Like `get`, but `txn_id` sees its own intent.
    pub fn get_in_txn(
        &self,
        key: &Key,
        ts: Timestamp,
        txn_id: Uuid,
    ) -> MvccResult<Option<Version>> {
        self.read(key, ts, Some(txn_id))
    }

    fn read(&self, key: &Key, ts: Timestamp, txn_id: Option<Uuid>) -> MvccResult<Option<Version>> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        let Some(history) = keys.get(key) else {
            return Ok(None);
        };

        if let Some((intent_ts, payload, meta)) = &history.intent {
            if Some(meta.txn_id) == txn_id {
                return Ok(visible(Version::intent(
                    key.clone(),
                    *intent_ts,
                    payload.clone(),
                    *meta,
                )));
            }
            if *intent_ts <= ts {
                return Err(WriteIntentError {
                    key: key.clone(),
                    txn_id: meta.txn_id,
                    intent_timestamp: *intent_ts,
                }
                .into());
            }
        }

        Ok(history
            .committed
            .range(..=ts)
            .next_back()
            .and_then(|(version_ts, payload)| {
                visible(Version::committed(key.clone(), *version_ts, payload.clone()))
            }))
    }

    /// All committed versions of `key`, oldest first.
    pub fn versions(&self, key: &Key) -> Vec<Version> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(key)
            .map(|history| {
                history
                    .committed
                    .iter()
                    .map(|(ts, payload)| Version::committed(key.clone(), *ts, payload.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The pending intent on `key`, if any.
    pub fn intent(&self, key: &Key) -> Option<Version> {
        let keys = self.keys.read().unwrap_or_else(PoisonError::into_inner);
        keys.get(key)
            .and_then(|history| history.intent.as_ref())
            .map(|(ts, payload, meta)| Version::intent(key.clone(), *ts, payload.clone(), *meta))
    }

    fn write_too_old(
        &self,
        key: Key,
        timestamp: Timestamp,
        existing_timestamp: Timestamp,
        actual_timestamp: Timestamp,
    ) -> MvccError {
        if let Some(metrics) = &self.metrics {
            metrics.increment_write_too_old_conflicts();
        }
        WriteTooOldError {
            key,
            timestamp,
            existing_timestamp,
            actual_timestamp,
        }
        .into()
    }
}

fn validate_write(key: &Key, ts: Timestamp) -> MvccResult<()> {
    if key.is_empty() {
        return Err(MvccError::EmptyKey);
    }
    if ts.is_empty() {
        return Err(MvccError::ZeroTimestamp(key.clone()));
    }
    Ok(())
}

fn visible(version: Version) -> Option<Version> {
    if version.is_tombstone() {
        None
    } else {
        Some(version)
    }
}
