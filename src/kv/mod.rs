//! KV request and error types shared by the replica read path

mod batch;
mod errors;

pub use batch::{BatchRequest, Request, RequestKind, Transaction};
pub use errors::{KvError, KvResult, NotLeaseHolderError};
