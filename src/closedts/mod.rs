//! Closed timestamps
//!
//! A leaseholder periodically promises that no write will ever commit at or
//! below some timestamp for a range, under its current lease epoch. Those
//! promises are streamed to every other node, which records them here and
//! uses them to decide whether a follower may serve a read locally.
//!
//! - `entry`: the watermark record and stream message
//! - `storage`: sharded per-(node, range) watermark storage
//! - `provider`: the seams the read path depends on
//! - `transport`: stream transport, plus an in-process implementation
//! - `client`: per-node subscription tasks

mod client;
mod entry;
mod errors;
mod provider;
mod storage;
mod transport;

pub use client::Clients;
pub use entry::{Entry, Update};
pub use errors::{ClosedTsError, ClosedTsResult};
pub use provider::{ClosedTimestampProvider, ClosedTimestampRequester, NoRefresh};
pub use storage::{ForwardOutcome, ShardedStorage};
pub use transport::{Connection, LocalTransport, Publisher, Transport};
