//! MVCC error types
//!
//! Conflicts are reported, never resolved here. The transaction layer
//! decides whether a bumped write timestamp is acceptable.

use thiserror::Error;
use uuid::Uuid;

use super::Key;
use crate::hlc::Timestamp;

/// Result type for MVCC operations
pub type MvccResult<T> = Result<T, MvccError>;

/// A write landed at or below an existing committed version.
///
/// The write has been applied at `actual_timestamp`, one logical tick past
/// the newest conflicting version.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "WriteTooOldError: write for key {key} at timestamp {timestamp} too old; \
     wrote at {actual_timestamp} (existing version at {existing_timestamp})"
)]
pub struct WriteTooOldError {
    pub key: Key,
    /// Timestamp the caller asked to write at.
    pub timestamp: Timestamp,
    /// Newest committed version that caused the conflict.
    pub existing_timestamp: Timestamp,
    /// Timestamp the write was applied at.
    pub actual_timestamp: Timestamp,
}

/// A provisional write by another transaction blocks the operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("conflicting intent on key {key} at {intent_timestamp} from txn {txn_id}")]
pub struct WriteIntentError {
    pub key: Key,
    pub txn_id: Uuid,
    pub intent_timestamp: Timestamp,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MvccError {
    #[error(transparent)]
    WriteTooOld(#[from] WriteTooOldError),

    #[error(transparent)]
    WriteIntent(#[from] WriteIntentError),

    #[error("no intent from txn {txn_id} on key {key}")]
    IntentNotFound { key: Key, txn_id: Uuid },

    #[error("empty key")]
    EmptyKey,

    #[error("cannot write key {0} at the zero timestamp")]
    ZeroTimestamp(Key),

    /// No timestamp exists above the newest committed version.
    #[error("no timestamp above existing version of key {key} at {existing_timestamp}")]
    TimestampExhausted {
        key: Key,
        existing_timestamp: Timestamp,
    },
}

impl MvccError {
    /// Returns the write-too-old detail, if this is one.
    pub fn as_write_too_old(&self) -> Option<&WriteTooOldError> {
        match self {
            MvccError::WriteTooOld(e) => Some(e),
            _ => None,
        }
    }

    /// Whether the caller may retry (possibly at a different timestamp).
    pub fn is_retryable(&self) -> bool {
        matches!(self, MvccError::WriteTooOld(_) | MvccError::WriteIntent(_))
    }
}
