//! Observable events
//!
//! Event names are explicit and typed so log consumers can match on them.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Follower reads
    /// A batch was cleared to be served below the closed timestamp
    FollowerReadServed,
    /// A batch could not be served locally; the routing error stands
    FollowerReadRejected,
    /// Expensive per-node closed timestamp dump (verbose diagnostics only)
    ClosedTsStorageDump,

    // Closed timestamp subscription clients
    /// Client task started for a remote node
    ClosedTsClientStarted,
    /// Stream to a remote node established
    ClosedTsClientConnected,
    /// Stream to a remote node lost
    ClosedTsClientDisconnected,
    /// Client task stopped
    ClosedTsClientStopped,
    /// Watermarks for a node dropped after its stream closed
    ClosedTsStreamEvicted,
    /// Entry dropped: not newer than what is stored, or from another node
    ClosedTsStaleEntry,

    // Leases
    /// New lease installed on a replica
    LeaseInstalled,
    /// Lease rejected because it does not supersede the current one
    LeaseRejected,

    // Configuration
    /// Configuration loaded
    ConfigLoaded,
}

impl Event {
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::FollowerReadServed => "FOLLOWER_READ_SERVED",
            Event::FollowerReadRejected => "FOLLOWER_READ_REJECTED",
            Event::ClosedTsStorageDump => "CLOSEDTS_STORAGE_DUMP",
            Event::ClosedTsClientStarted => "CLOSEDTS_CLIENT_STARTED",
            Event::ClosedTsClientConnected => "CLOSEDTS_CLIENT_CONNECTED",
            Event::ClosedTsClientDisconnected => "CLOSEDTS_CLIENT_DISCONNECTED",
            Event::ClosedTsClientStopped => "CLOSEDTS_CLIENT_STOPPED",
            Event::ClosedTsStreamEvicted => "CLOSEDTS_STREAM_EVICTED",
            Event::ClosedTsStaleEntry => "CLOSEDTS_STALE_ENTRY",
            Event::LeaseInstalled => "LEASE_INSTALLED",
            Event::LeaseRejected => "LEASE_REJECTED",
            Event::ConfigLoaded => "CONFIG_LOADED",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
