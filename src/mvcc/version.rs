//! Version - one timestamped entry in a key's history
//!
//! A version carries either a value or an explicit tombstone. Versions
//! written by an in-flight transaction carry intent metadata until the
//! transaction resolves them.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::hlc::Timestamp;

/// A key in the MVCC store. Serialized as a (lossy) UTF-8 string.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Key(pub Vec<u8>);

impl Key {
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<String> for Key {
    fn from(s: String) -> Self {
        Self(s.into_bytes())
    }
}

impl From<Key> for String {
    fn from(key: Key) -> Self {
        String::from_utf8_lossy(&key.0).into_owned()
    }
}

impl From<&[u8]> for Key {
    fn from(bytes: &[u8]) -> Self {
        Self(bytes.to_vec())
    }
}

impl From<Vec<u8>> for Key {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", String::from_utf8_lossy(&self.0))
    }
}

/// A value in the MVCC store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Value(pub Vec<u8>);

impl Value {
    #[inline]
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self(s.as_bytes().to_vec())
    }
}

impl From<Vec<u8>> for Value {
    fn from(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }
}

/// Either a value or an explicit deletion marker.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionPayload {
    Value(Value),
    Tombstone,
}

impl VersionPayload {
    #[inline]
    pub fn is_tombstone(&self) -> bool {
        matches!(self, VersionPayload::Tombstone)
    }

    /// Returns the value, or `None` for a tombstone.
    pub fn value(&self) -> Option<&Value> {
        match self {
            VersionPayload::Value(v) => Some(v),
            VersionPayload::Tombstone => None,
        }
    }
}

/// Metadata attached to a provisional write.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntentMeta {
    /// Owning transaction.
    pub txn_id: Uuid,
    /// Transaction epoch (incremented on restart).
    pub epoch: u32,
}

impl IntentMeta {
    pub fn new(txn_id: Uuid, epoch: u32) -> Self {
        Self { txn_id, epoch }
    }
}

/// A single version of a key.
///
/// Fields are private; a stored version never changes in place.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Version {
    key: Key,
    timestamp: Timestamp,
    payload: VersionPayload,
    intent: Option<IntentMeta>,
}

impl Version {
    /// A committed version.
    pub fn committed(key: Key, timestamp: Timestamp, payload: VersionPayload) -> Self {
        Self {
            key,
            timestamp,
            payload,
            intent: None,
        }
    }

    /// A provisional version owned by a transaction.
    pub fn intent(
        key: Key,
        timestamp: Timestamp,
        payload: VersionPayload,
        meta: IntentMeta,
    ) -> Self {
        Self {
            key,
            timestamp,
            payload,
            intent: Some(meta),
        }
    }

    #[inline]
    pub fn key(&self) -> &Key {
        &self.key
    }

    #[inline]
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    #[inline]
    pub fn payload(&self) -> &VersionPayload {
        &self.payload
    }

    #[inline]
    pub fn intent_meta(&self) -> Option<&IntentMeta> {
        self.intent.as_ref()
    }

    #[inline]
    pub fn is_intent(&self) -> bool {
        self.intent.is_some()
    }

    #[inline]
    pub fn is_tombstone(&self) -> bool {
        self.payload.is_tombstone()
    }
}
