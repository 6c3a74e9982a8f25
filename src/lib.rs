//! rangekv - closed timestamps and follower reads for a range-partitioned,
//! replicated KV store
//!
//! - `hlc`: hybrid logical clock timestamps
//! - `mvcc`: versioned storage with write-too-old ordering
//! - `lease`: range leases and replica lease state
//! - `closedts`: closed timestamp storage and subscriptions
//! - `kv`: batch requests and routing errors
//! - `replica`: follower-read eligibility

pub mod cli;
pub mod closedts;
pub mod config;
pub mod hlc;
pub mod kv;
pub mod lease;
pub mod mvcc;
pub mod observability;
pub mod replica;
