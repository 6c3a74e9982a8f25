//! Per-node closed timestamp subscription clients
//!
//! One background task per remote node keeps a stream open, folds every
//! update into the shared `ShardedStorage`, and forwards refresh requests
//! for ranges whose watermark was found too low. When a stream closes,
//! everything learned from that node is evicted and the task reconnects
//! after a jittered backoff.
//!
//! Clients are started lazily, the first time a request names a node.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use rand::Rng;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::entry::Update;
use super::errors::{ClosedTsError, ClosedTsResult};
use super::provider::ClosedTimestampRequester;
use super::storage::ShardedStorage;
use super::transport::{Connection, Transport};
use crate::config::ClosedTsConfig;
use crate::lease::{NodeId, RangeId};
use crate::observability::{log_event_with_fields, trace_event, Event, Logger, MetricsRegistry, Severity};

/// Handle to one node's subscription task.
struct ClientHandle {
    requests: mpsc::UnboundedSender<RangeId>,
    pending: Arc<Mutex<HashSet<RangeId>>>,
    task: JoinHandle<()>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    storage: Arc<ShardedStorage>,
    metrics: Arc<MetricsRegistry>,
    config: ClosedTsConfig,
    runtime: Handle,
    clients: Mutex<HashMap<NodeId, ClientHandle>>,
    shutdown_tx: watch::Sender<bool>,
}

/// Registry of subscription clients, keyed by node.
#[derive(Clone)]
pub struct Clients {
    inner: Arc<Inner>,
}

impl Clients {
    /// Clients spawning onto the current tokio runtime.
    pub fn new(
        transport: Arc<dyn Transport>,
        storage: Arc<ShardedStorage>,
        metrics: Arc<MetricsRegistry>,
        config: ClosedTsConfig,
    ) -> ClosedTsResult<Self> {
        let runtime = Handle::try_current().map_err(|_| ClosedTsError::NoRuntime)?;
        Ok(Self::with_runtime(transport, storage, metrics, config, runtime))
    }

    pub fn with_runtime(
        transport: Arc<dyn Transport>,
        storage: Arc<ShardedStorage>,
        metrics: Arc<MetricsRegistry>,
        config: ClosedTsConfig,
        runtime: Handle,
    ) -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                transport,
                storage,
                metrics,
                config,
                runtime,
                clients: Mutex::new(HashMap::new()),
                shutdown_tx,
            }),
        }
    }

    pub fn storage(&self) -> &Arc<ShardedStorage> {
        &self.inner.storage
    }

    /// Starts the client for `node` unless one is already running.
    ///
    /// Returns false once the registry has been shut down.
    pub fn ensure_client(&self, node: NodeId) -> bool {
        let mut clients = self.lock_clients();
        self.ensure_locked(&mut clients, node).is_some()
    }

    /// Number of running clients.
    pub fn client_count(&self) -> usize {
        self.lock_clients()
            .values()
            .filter(|c| !c.task.is_finished())
            .count()
    }

    /// Stops every client and waits for their tasks to exit.
    pub async fn shutdown(&self) {
        let _ = self.inner.shutdown_tx.send(true);
        let handles: Vec<ClientHandle> = self.lock_clients().drain().map(|(_, h)| h).collect();
        for handle in handles {
            let _ = handle.task.await;
        }
    }

    fn is_shut_down(&self) -> bool {
        *self.inner.shutdown_tx.borrow()
    }

    fn lock_clients(&self) -> std::sync::MutexGuard<'_, HashMap<NodeId, ClientHandle>> {
        self.inner
            .clients
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_locked<'a>(
        &self,
        clients: &'a mut HashMap<NodeId, ClientHandle>,
        node: NodeId,
    ) -> Option<&'a ClientHandle> {
        if self.is_shut_down() {
            return None;
        }

        let running = clients.get(&node).is_some_and(|c| !c.task.is_finished());
        if !running {
            let handle = self.spawn_client(node);
            clients.insert(node, handle);
        }
        clients.get(&node)
    }

    fn spawn_client(&self, node: NodeId) -> ClientHandle {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Mutex::new(HashSet::new()));

        let task = SubscriptionTask {
            node,
            transport: Arc::clone(&self.inner.transport),
            storage: Arc::clone(&self.inner.storage),
            metrics: Arc::clone(&self.inner.metrics),
            config: self.inner.config.clone(),
            requests: requests_rx,
            pending: Arc::clone(&pending),
            shutdown: self.inner.shutdown_tx.subscribe(),
        };

        ClientHandle {
            requests: requests_tx,
            pending,
            task: self.inner.runtime.spawn(task.run()),
        }
    }
}

impl ClosedTimestampRequester for Clients {
    fn request(&self, node: NodeId, range: RangeId) {
        let mut clients = self.lock_clients();
        let Some(client) = self.ensure_locked(&mut clients, node) else {
            return;
        };

        let newly_pending = client
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(range);
        if newly_pending {
            let _ = client.requests.send(range);
        }
    }
}

/// How a stream ended.
#[derive(Debug, PartialEq, Eq)]
enum StreamEnd {
    Closed,
    Shutdown,
}

struct SubscriptionTask {
    node: NodeId,
    transport: Arc<dyn Transport>,
    storage: Arc<ShardedStorage>,
    metrics: Arc<MetricsRegistry>,
    config: ClosedTsConfig,
    requests: mpsc::UnboundedReceiver<RangeId>,
    pending: Arc<Mutex<HashSet<RangeId>>>,
    shutdown: watch::Receiver<bool>,
}

impl SubscriptionTask {
    async fn run(mut self) {
        let node = self.node.to_string();
        log_event_with_fields(Event::ClosedTsClientStarted, &[("node_id", node.as_str())]);

        let mut attempt: u32 = 0;
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            match self.transport.connect(self.node) {
                Ok(conn) => {
                    attempt = 0;
                    log_event_with_fields(
                        Event::ClosedTsClientConnected,
                        &[("node_id", node.as_str())],
                    );

                    let end = self.serve(conn).await;

                    let evicted = self.storage.evict_node(self.node).to_string();
                    log_event_with_fields(
                        Event::ClosedTsStreamEvicted,
                        &[("node_id", node.as_str()), ("entries", evicted.as_str())],
                    );
                    if end == StreamEnd::Shutdown {
                        break;
                    }
                }
                Err(err) => {
                    let error = err.to_string();
                    Logger::warn(
                        Event::ClosedTsClientDisconnected.as_str(),
                        &[("node_id", node.as_str()), ("error", error.as_str())],
                    );
                }
            }

            self.metrics.increment_closed_ts_reconnects();
            let delay = backoff_delay(&self.config, attempt);
            attempt = attempt.saturating_add(1);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        log_event_with_fields(Event::ClosedTsClientStopped, &[("node_id", node.as_str())]);
    }

    async fn serve(&mut self, mut conn: Connection) -> StreamEnd {
        loop {
            tokio::select! {
                update = conn.updates.recv() => match update {
                    Some(update) => self.apply(update),
                    None => {
                        let node = self.node.to_string();
                        log_event_with_fields(
                            Event::ClosedTsClientDisconnected,
                            &[("node_id", node.as_str())],
                        );
                        return StreamEnd::Closed;
                    }
                },
                Some(range) = self.requests.recv() => {
                    self.pending
                        .lock()
                        .unwrap_or_else(PoisonError::into_inner)
                        .remove(&range);
                    if conn.requests.send(range).is_err() {
                        return StreamEnd::Closed;
                    }
                }
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        return StreamEnd::Shutdown;
                    }
                }
            }
        }
    }

    fn apply(&self, update: Update) {
        for entry in update.entries {
            let applied = entry.node_id == self.node && self.storage.forward(entry).is_applied();
            if applied {
                self.metrics.increment_closed_ts_updates_applied();
                continue;
            }

            self.metrics.increment_closed_ts_updates_stale();
            if Logger::enabled(Severity::Trace) {
                let stream = self.node.to_string();
                let entry = entry.to_string();
                trace_event(
                    Event::ClosedTsStaleEntry,
                    &[("stream", stream.as_str()), ("entry", entry.as_str())],
                );
            }
        }
    }
}

/// Exponential backoff capped at the configured maximum, jittered into
/// the upper half of the window.
fn backoff_delay(config: &ClosedTsConfig, attempt: u32) -> Duration {
    let min = config.reconnect_backoff_min_ms.max(1);
    let max = config.reconnect_backoff_max_ms.max(min);
    let ceiling = min.saturating_mul(1u64 << attempt.min(16)).min(max);
    let floor = (ceiling / 2).max(1);
    Duration::from_millis(rand::thread_rng().gen_range(floor..=ceiling))
}
