//! Sharded closed timestamp storage
//!
//! One entry per (node, range): the newest watermark under the newest epoch
//! seen for that pair. Buckets are spread over a fixed set of shards, each
//! behind its own lock, so traffic for different ranges rarely contends.
//!
//! Rules for `forward`:
//! - a higher epoch replaces the entry outright
//! - a lower epoch is stale and dropped
//! - within an epoch a higher LAI replaces the entry, a higher timestamp at
//!   the same LAI advances it, and the stored timestamp never goes down
//!
//! `max_closed` only honours an entry recorded under exactly the queried
//! epoch, so watermarks from a previous lease incarnation are inert.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::Write as _;
use std::hash::{Hash, Hasher};
use std::sync::{PoisonError, RwLock};

use super::entry::Entry;
use super::provider::ClosedTimestampProvider;
use crate::hlc::Timestamp;
use crate::lease::{Epoch, Lai, NodeId, RangeId};

type Bucket = HashMap<(NodeId, RangeId), Entry>;

/// What `forward` did with an entry.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ForwardOutcome {
    /// First entry for this (node, range).
    Inserted,
    /// Same epoch, newer LAI or timestamp.
    Advanced,
    /// Newer epoch replaced an entry from `previous`.
    Superseded { previous: Epoch },
    /// Older epoch, or nothing newer than what is stored.
    Stale,
}

impl ForwardOutcome {
    pub fn is_applied(&self) -> bool {
        !matches!(self, ForwardOutcome::Stale)
    }
}

#[derive(Debug)]
pub struct ShardedStorage {
    shards: Vec<RwLock<Bucket>>,
}

impl ShardedStorage {
    pub const DEFAULT_SHARDS: usize = 16;

    /// Storage with `shard_count` shards (at least one).
    pub fn new(shard_count: usize) -> Self {
        let shards = (0..shard_count.max(1))
            .map(|_| RwLock::new(HashMap::new()))
            .collect();
        Self { shards }
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    fn shard(&self, node: NodeId, range: RangeId) -> &RwLock<Bucket> {
        let mut hasher = DefaultHasher::new();
        (node, range).hash(&mut hasher);
        let idx = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[idx]
    }

    /// Records `entry` if it is newer than what is stored.
    pub fn forward(&self, entry: Entry) -> ForwardOutcome {
        let key = (entry.node_id, entry.range_id);
        let mut bucket = self
            .shard(entry.node_id, entry.range_id)
            .write()
            .unwrap_or_else(PoisonError::into_inner);

        let Some(current) = bucket.get_mut(&key) else {
            bucket.insert(key, entry);
            return ForwardOutcome::Inserted;
        };

        if entry.epoch > current.epoch {
            let previous = current.epoch;
            *current = entry;
            return ForwardOutcome::Superseded { previous };
        }
        if entry.epoch < current.epoch {
            return ForwardOutcome::Stale;
        }

        let newer_lai = entry.lai > current.lai;
        let newer_ts_same_lai = entry.lai == current.lai && entry.closed > current.closed;
        if !newer_lai && !newer_ts_same_lai {
            return ForwardOutcome::Stale;
        }
        current.lai = entry.lai;
        current.closed.forward(entry.closed);
        ForwardOutcome::Advanced
    }

    /// The stored entry for (node, range), whatever its epoch.
    pub fn entry(&self, node: NodeId, range: RangeId) -> Option<Entry> {
        self.shard(node, range)
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(node, range))
            .copied()
    }

    /// Drops every entry published by `node`. Returns how many were dropped.
    ///
    /// Called when the stream from `node` closes.
    pub fn evict_node(&self, node: NodeId) -> usize {
        let mut evicted = 0;
        for shard in &self.shards {
            let mut bucket = shard.write().unwrap_or_else(PoisonError::into_inner);
            let before = bucket.len();
            bucket.retain(|(n, _), _| *n != node);
            evicted += before - bucket.len();
        }
        evicted
    }

    /// Number of (node, range) pairs tracked.
    pub fn len(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().unwrap_or_else(PoisonError::into_inner).len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry from `node`, sorted by range.
    pub fn entries_for_node(&self, node: NodeId) -> Vec<Entry> {
        let mut entries: Vec<Entry> = self
            .shards
            .iter()
            .flat_map(|s| {
                s.read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .filter(|e| e.node_id == node)
                    .copied()
                    .collect::<Vec<_>>()
            })
            .collect();
        entries.sort_by_key(|e| e.range_id);
        entries
    }
}

impl Default for ShardedStorage {
    fn default() -> Self {
        Self::new(Self::DEFAULT_SHARDS)
    }
}

impl ClosedTimestampProvider for ShardedStorage {
    fn max_closed(&self, node: NodeId, range: RangeId, epoch: Epoch, lai: Lai) -> Timestamp {
        match self.entry(node, range) {
            Some(entry) if entry.epoch == epoch && entry.lai >= lai => entry.closed,
            _ => Timestamp::ZERO,
        }
    }

    fn describe_node(&self, node: NodeId) -> String {
        let mut out = String::new();
        let _ = write!(out, "{}:", node);
        for entry in self.entries_for_node(node) {
            let _ = write!(
                out,
                " {}@epo={},lai={},closed={}",
                entry.range_id, entry.epoch, entry.lai, entry.closed
            );
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(epoch: i64, lai: u64, closed: i64) -> Entry {
        Entry::new(NodeId(1), RangeId(7), Epoch(epoch), Lai(lai), Timestamp::from_wall(closed))
    }

    fn query(storage: &ShardedStorage, epoch: i64, lai: u64) -> Timestamp {
        storage.max_closed(NodeId(1), RangeId(7), Epoch(epoch), Lai(lai))
    }

    #[test]
    fn test_unknown_is_zero() {
        let storage = ShardedStorage::default();
        assert_eq!(query(&storage, 5, 1), Timestamp::ZERO);
    }

    #[test]
    fn test_insert_and_query() {
        let storage = ShardedStorage::default();
        assert_eq!(storage.forward(entry(5, 10, 100)), ForwardOutcome::Inserted);
        assert_eq!(query(&storage, 5, 10), Timestamp::from_wall(100));
        assert_eq!(query(&storage, 5, 3), Timestamp::from_wall(100));
    }

    #[test]
    fn test_query_beyond_stored_lai_is_zero() {
        let storage = ShardedStorage::default();
        storage.forward(entry(5, 10, 100));
        assert_eq!(query(&storage, 5, 11), Timestamp::ZERO);
    }

    #[test]
    fn test_same_epoch_advances() {
        let storage = ShardedStorage::default();
        storage.forward(entry(5, 10, 100));
        assert_eq!(storage.forward(entry(5, 12, 120)), ForwardOutcome::Advanced);
        assert_eq!(query(&storage, 5, 12), Timestamp::from_wall(120));

        // Same LAI, later timestamp.
        assert_eq!(storage.forward(entry(5, 12, 130)), ForwardOutcome::Advanced);
        assert_eq!(query(&storage, 5, 12), Timestamp::from_wall(130));
    }

    #[test]
    fn test_same_epoch_never_regresses() {
        let storage = ShardedStorage::default();
        storage.forward(entry(5, 10, 100));
        assert_eq!(storage.forward(entry(5, 9, 200)), ForwardOutcome::Stale);
        assert_eq!(storage.forward(entry(5, 10, 90)), ForwardOutcome::Stale);

        // Higher LAI carrying a lower timestamp keeps the old timestamp.
        assert_eq!(storage.forward(entry(5, 11, 50)), ForwardOutcome::Advanced);
        assert_eq!(query(&storage, 5, 11), Timestamp::from_wall(100));
    }

    #[test]
    fn test_new_epoch_isolates_old_watermark() {
        let storage = ShardedStorage::default();
        storage.forward(entry(5, 10, 500));
        assert_eq!(
            storage.forward(entry(6, 1, 100)),
            ForwardOutcome::Superseded { previous: Epoch(5) }
        );
        assert_eq!(query(&storage, 5, 1), Timestamp::ZERO);
        assert_eq!(query(&storage, 6, 1), Timestamp::from_wall(100));
        assert_eq!(storage.forward(entry(5, 20, 900)), ForwardOutcome::Stale);
    }

    #[test]
    fn test_evict_node() {
        let storage = ShardedStorage::new(4);
        storage.forward(entry(5, 1, 10));
        storage.forward(Entry::new(NodeId(1), RangeId(8), Epoch(5), Lai(1), Timestamp::from_wall(10)));
        storage.forward(Entry::new(NodeId(2), RangeId(7), Epoch(3), Lai(1), Timestamp::from_wall(10)));
        assert_eq!(storage.len(), 3);

        assert_eq!(storage.evict_node(NodeId(1)), 2);
        assert_eq!(storage.len(), 1);
        assert_eq!(query(&storage, 5, 1), Timestamp::ZERO);
        assert!(storage.entry(NodeId(2), RangeId(7)).is_some());
    }

    #[test]
    fn test_describe_node_lists_ranges() {
        let storage = ShardedStorage::default();
        storage.forward(entry(5, 10, 100));
        let dump = storage.describe_node(NodeId(1));
        assert!(dump.starts_with("n1:"));
        assert!(dump.contains("r7@epo=5,lai=10,closed=100.0"));
        assert_eq!(storage.describe_node(NodeId(9)), "n9:");
    }

    #[test]
    fn test_zero_shards_clamped() {
        let storage = ShardedStorage::new(0);
        assert_eq!(storage.shard_count(), 1);
        storage.forward(entry(1, 1, 1));
        assert!(!storage.is_empty());
    }
}
