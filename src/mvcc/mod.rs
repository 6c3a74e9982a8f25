//! MVCC versioned storage
//!
//! The ordering contract every range upholds:
//! - committed versions of a key are strictly ordered by timestamp
//! - a read at `T` never observes a version above `T`
//! - a write at or below the newest committed version is bumped past it and
//!   reported as `WriteTooOldError`, never silently reordered
//!
//! This store is in-memory; the on-disk encoding is not modelled.

mod errors;
mod store;
mod version;

pub use errors::{MvccError, MvccResult, WriteIntentError, WriteTooOldError};
pub use store::MvccStore;
pub use version::{IntentMeta, Key, Value, Version, VersionPayload};
