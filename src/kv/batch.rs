//! Batch requests as seen by a replica

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hlc::Timestamp;
use crate::lease::RangeId;
use crate::mvcc::Key;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    Get,
    Scan,
    ReverseScan,
    Put,
    ConditionalPut,
    Delete,
    DeleteRange,
    LeaseInfo,
    QueryTxn,
}

impl RequestKind {
    /// Writes acquire locks.
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            RequestKind::Put
                | RequestKind::ConditionalPut
                | RequestKind::Delete
                | RequestKind::DeleteRange
        )
    }

    /// May run inside a transaction.
    pub fn is_transactional(&self) -> bool {
        !matches!(self, RequestKind::LeaseInfo | RequestKind::QueryTxn)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub kind: RequestKind,
    #[serde(default)]
    pub key: Key,
    /// A read that takes locks (SELECT ... FOR UPDATE).
    #[serde(default)]
    pub for_update: bool,
}

impl Request {
    pub fn new(kind: RequestKind, key: impl Into<Key>) -> Self {
        Self {
            kind,
            key: key.into(),
            for_update: false,
        }
    }

    pub fn get(key: impl Into<Key>) -> Self {
        Self::new(RequestKind::Get, key)
    }

    pub fn scan(key: impl Into<Key>) -> Self {
        Self::new(RequestKind::Scan, key)
    }

    pub fn put(key: impl Into<Key>) -> Self {
        Self::new(RequestKind::Put, key)
    }

    pub fn for_update(mut self) -> Self {
        self.for_update = true;
        self
    }

    pub fn is_locking(&self) -> bool {
        self.for_update || self.kind.is_write()
    }

    pub fn is_transactional(&self) -> bool {
        self.kind.is_transactional()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub read_timestamp: Timestamp,
    /// Top of the uncertainty interval.
    pub max_timestamp: Timestamp,
    /// Whether the transaction has acquired locks or written.
    #[serde(default)]
    pub locking: bool,
}

impl Transaction {
    pub fn new(read_timestamp: Timestamp, max_timestamp: Timestamp) -> Self {
        Self {
            id: Uuid::new_v4(),
            read_timestamp,
            max_timestamp,
            locking: false,
        }
    }

    pub fn is_locking(&self) -> bool {
        self.locking
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub range_id: RangeId,
    pub timestamp: Timestamp,
    #[serde(default)]
    pub txn: Option<Transaction>,
    pub requests: Vec<Request>,
}

impl BatchRequest {
    pub fn new(range_id: RangeId, timestamp: Timestamp) -> Self {
        Self {
            range_id,
            timestamp,
            txn: None,
            requests: Vec::new(),
        }
    }

    pub fn with_txn(mut self, txn: Transaction) -> Self {
        self.txn = Some(txn);
        self
    }

    pub fn with_request(mut self, request: Request) -> Self {
        self.requests.push(request);
        self
    }

    /// Any request takes locks.
    pub fn is_locking(&self) -> bool {
        self.requests.iter().any(Request::is_locking)
    }

    /// Every request may run in a transaction. False for an empty batch.
    pub fn is_all_transactional(&self) -> bool {
        !self.requests.is_empty() && self.requests.iter().all(Request::is_transactional)
    }

    pub fn is_read_only(&self) -> bool {
        self.requests.iter().all(|r| !r.kind.is_write())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch() -> BatchRequest {
        BatchRequest::new(RangeId(1), Timestamp::from_wall(10))
    }

    #[test]
    fn test_read_batch_flags() {
        let ba = batch().with_request(Request::get("a")).with_request(Request::scan("b"));
        assert!(!ba.is_locking());
        assert!(ba.is_all_transactional());
        assert!(ba.is_read_only());
    }

    #[test]
    fn test_write_makes_batch_locking() {
        let ba = batch().with_request(Request::get("a")).with_request(Request::put("a"));
        assert!(ba.is_locking());
        assert!(!ba.is_read_only());
    }

    #[test]
    fn test_for_update_read_is_locking() {
        let ba = batch().with_request(Request::get("a").for_update());
        assert!(ba.is_locking());
        assert!(ba.is_read_only());
    }

    #[test]
    fn test_non_transactional_request() {
        let ba = batch()
            .with_request(Request::get("a"))
            .with_request(Request::new(RequestKind::LeaseInfo, "a"));
        assert!(!ba.is_all_transactional());
        assert!(!batch().is_all_transactional());
    }

    #[test]
    fn test_batch_deserializes_without_txn() {
        let ba: BatchRequest = serde_json::from_str(
            r#"{"range_id": 7, "timestamp": {"wall_time": 90}, "requests": [{"kind": "get", "key": "a"}]}"#,
        )
        .unwrap();
        assert_eq!(ba.range_id, RangeId(7));
        assert_eq!(ba.timestamp, Timestamp::from_wall(90));
        assert!(ba.txn.is_none());
        assert_eq!(ba.requests[0].kind, RequestKind::Get);
    }
}
