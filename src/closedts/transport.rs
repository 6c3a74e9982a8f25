//! Closed timestamp stream transport
//!
//! The network layer is outside this crate. `Transport` is the seam a real
//! RPC implementation plugs into; `LocalTransport` connects clients to
//! in-process publishers on the same runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tokio::sync::mpsc;

use super::entry::{Entry, Update};
use super::errors::{ClosedTsError, ClosedTsResult};
use crate::config::ClosedTsConfig;
use crate::lease::{NodeId, RangeId};

/// An open stream to one node.
#[derive(Debug)]
pub struct Connection {
    /// Watermark updates from the node. `None` means the stream closed.
    pub updates: mpsc::Receiver<Update>,
    /// Refresh requests to the node.
    pub requests: mpsc::UnboundedSender<RangeId>,
}

/// Opens closed timestamp streams.
pub trait Transport: Send + Sync + 'static {
    fn connect(&self, node: NodeId) -> ClosedTsResult<Connection>;
}

#[derive(Debug)]
struct PublisherState {
    node_id: NodeId,
    reachable: AtomicBool,
    sessions: Mutex<Vec<mpsc::Sender<Update>>>,
    requests_tx: mpsc::UnboundedSender<RangeId>,
    requests_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RangeId>>,
}

/// In-process transport.
#[derive(Debug, Clone)]
pub struct LocalTransport {
    nodes: Arc<RwLock<HashMap<NodeId, Arc<PublisherState>>>>,
    channel_capacity: usize,
}

impl LocalTransport {
    /// Each session buffers up to `channel_capacity` updates.
    pub fn new(channel_capacity: usize) -> Self {
        Self {
            nodes: Arc::default(),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Transport buffering `update_channel_capacity` updates per session.
    pub fn from_config(config: &ClosedTsConfig) -> Self {
        Self::new(config.update_channel_capacity)
    }

    /// The publishing end for `node`, registering the node on first use.
    pub fn publisher(&self, node: NodeId) -> Publisher {
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        let state = nodes
            .entry(node)
            .or_insert_with(|| {
                let (requests_tx, requests_rx) = mpsc::unbounded_channel();
                Arc::new(PublisherState {
                    node_id: node,
                    reachable: AtomicBool::new(true),
                    sessions: Mutex::new(Vec::new()),
                    requests_tx,
                    requests_rx: tokio::sync::Mutex::new(requests_rx),
                })
            })
            .clone();
        Publisher { state }
    }
}

impl Default for LocalTransport {
    fn default() -> Self {
        Self::from_config(&ClosedTsConfig::default())
    }
}

impl Transport for LocalTransport {
    fn connect(&self, node: NodeId) -> ClosedTsResult<Connection> {
        let state = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node)
            .cloned()
            .ok_or_else(|| ClosedTsError::unreachable(node, "unknown node"))?;

        if !state.reachable.load(Ordering::Acquire) {
            return Err(ClosedTsError::unreachable(node, "node unreachable"));
        }

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        state
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);

        Ok(Connection {
            updates: rx,
            requests: state.requests_tx.clone(),
        })
    }
}

/// Publishing end of one node's stream.
#[derive(Debug, Clone)]
pub struct Publisher {
    state: Arc<PublisherState>,
}

impl Publisher {
    pub fn node_id(&self) -> NodeId {
        self.state.node_id
    }

    /// Sends `entries` to every connected session. Returns how many
    /// sessions received it; full or closed sessions are skipped, closed
    /// ones are forgotten.
    pub fn publish(&self, entries: Vec<Entry>) -> usize {
        let update = Update::new(self.state.node_id, entries);
        let mut sessions = self
            .state
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|tx| !tx.is_closed());

        sessions
            .iter()
            .filter(|tx| tx.try_send(update.clone()).is_ok())
            .count()
    }

    /// Closes every open session; clients see their stream end.
    pub fn disconnect_all(&self) {
        self.state
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// While unreachable, new connections fail.
    pub fn set_reachable(&self, reachable: bool) {
        self.state.reachable.store(reachable, Ordering::Release);
    }

    pub fn session_count(&self) -> usize {
        let mut sessions = self
            .state
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        sessions.retain(|tx| !tx.is_closed());
        sessions.len()
    }

    /// Next refresh request sent to this node.
    pub async fn recv_request(&self) -> Option<RangeId> {
        self.state.requests_rx.lock().await.recv().await
    }

    /// Refresh request already queued, if any.
    pub fn try_recv_request(&self) -> Option<RangeId> {
        self.state.requests_rx.try_lock().ok()?.try_recv().ok()
    }
}
