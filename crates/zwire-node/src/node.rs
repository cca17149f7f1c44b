// Copyright 2025 zwire Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use parking_lot::Mutex;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use zwire_common::{Codec, Connection, DeliveryQueue, JsonCodec, NodeIdentity, Regions, ZwireError};
use zwire_metrics::{MetricsSnapshot, NodeMetricsCollector};

use crate::config::NodeConfig;
use crate::dispatcher::Dispatcher;
use crate::error::{ErrorHandler, ErrorReporter, NodeError};
use crate::functions::FunctionTable;
use crate::handler::CallExecutor;
use crate::relay::{self, Relay};
use crate::runtime::{BoaPool, InterpreterPool, OnCreateHook, ScriptHost};
use crate::watcher::{WatchExit, WatchLoop};

/// A zwire agent.
///
/// Configure it with [`bind`](Self::bind) and
/// [`add_connection`](Self::add_connection), then [`start`](Self::start) it.
/// Starting freezes the function table and the connection set; both are
/// shared read-only with every task from then on.
pub struct Node {
    config: NodeConfig,
    node_path: String,
    info_path: String,
    functions: FunctionTable,
    connections: Vec<Arc<dyn Connection>>,
    codec: Option<Arc<dyn Codec>>,
    pool: Arc<dyn InterpreterPool>,
    errors: ErrorReporter,
    metrics: Arc<NodeMetricsCollector>,
    queue_tx: Option<DeliveryQueue>,
    queue_rx: Option<mpsc::Receiver<Vec<u8>>>,
    relay: Option<Arc<Relay>>,
    executor: Option<Arc<CallExecutor>>,
    watch_tasks: Mutex<Vec<JoinHandle<WatchExit>>>,
}

impl Node {
    /// Creates an agent for this process on `hostname`.
    ///
    /// An empty region list means the single region `default`. Every other
    /// setting takes its default from [`NodeConfig::new`].
    ///
    /// # Arguments
    /// * `hostname` - Host part of the agent's paths
    /// * `regions` - Regions whose wires the agent watches
    pub fn new<I, S>(hostname: impl Into<String>, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_config(NodeConfig::new(hostname, regions))
    }

    /// Creates an agent from a full configuration.
    ///
    /// The delivery queue, the Boa pool and the metrics collector are sized
    /// from `config`. Nothing touches a runtime until [`start`](Self::start).
    pub fn with_config(config: NodeConfig) -> Self {
        let (queue_tx, queue_rx) = mpsc::channel(config.queue_size.max(1));
        let pool = Arc::new(BoaPool::new(config.pool.clone()));
        let metrics = Arc::new(NodeMetricsCollector::with_config(config.metrics.clone()));

        Self {
            node_path: config.identity.node_path(),
            info_path: config.identity.info_path(),
            config,
            functions: FunctionTable::new(),
            connections: Vec::new(),
            codec: None,
            pool,
            errors: ErrorReporter::default(),
            metrics,
            queue_tx: Some(queue_tx),
            queue_rx: Some(queue_rx),
            relay: None,
            executor: None,
            watch_tasks: Mutex::new(Vec::new()),
        }
    }

    /// Sets the callback receiving every recoverable error.
    pub fn with_error_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(&ZwireError) + Send + Sync + 'static,
    {
        let handler: ErrorHandler = Arc::new(handler);
        self.errors = ErrorReporter::new(Some(handler));
        self
    }

    /// Replaces the default JSON codec.
    pub fn with_codec<C: Codec + 'static>(mut self, codec: C) -> Self {
        self.codec = Some(Arc::new(codec));
        self
    }

    /// Replaces the default Boa interpreter pool.
    pub fn with_pool(mut self, pool: Arc<dyn InterpreterPool>) -> Self {
        self.pool = pool;
        self
    }

    /// Binds a native handler. Native handlers take precedence over scripts.
    ///
    /// Binding a name twice replaces the earlier handler.
    ///
    /// # Errors
    /// * `NodeError::AlreadyStarted` after [`start`](Self::start)
    /// * `NodeError::EmptyName` for an empty `name`
    pub fn bind<F>(&mut self, name: impl Into<String>, function: F) -> Result<(), NodeError>
    where
        F: Fn(Value) -> zwire_common::Result<Value> + Send + Sync + 'static,
    {
        if self.is_started() {
            return Err(NodeError::AlreadyStarted);
        }
        self.functions.bind(name, Arc::new(function))
    }

    /// Registers this agent through `connection` and adds it to the set.
    ///
    /// The registration record at the info path carries the current local
    /// time in RFC 2822 form.
    ///
    /// # Errors
    /// * `NodeError::AlreadyStarted` after [`start`](Self::start)
    /// * `NodeError::Zwire` when registration fails. The error is reported
    ///   as well, and the connection is not added.
    pub async fn add_connection(&mut self, connection: Arc<dyn Connection>) -> Result<(), NodeError> {
        if self.is_started() {
            return Err(NodeError::AlreadyStarted);
        }

        let timestamp = chrono::Local::now().to_rfc2822();
        if let Err(e) = connection.register(&self.info_path, timestamp.as_bytes()).await {
            self.errors.report(&e);
            return Err(e.into());
        }

        self.connections.push(connection);
        info!(
            path = %self.info_path,
            connections = self.connections.len(),
            "Registered connection"
        );
        Ok(())
    }

    /// Starts watching and dispatching.
    ///
    /// Installs the pool's on-create hook (load `script_root`, bind the relay
    /// primitives), launches one watch loop per (connection, path) pair for
    /// the node path and every region wire path, then the dispatch loop.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    /// * `NodeError::AlreadyStarted` on a second call
    /// * `NodeError::Runtime` outside a tokio runtime
    /// * `NodeError::Zwire` if the pool refuses the on-create hook
    pub fn start(&mut self, script_root: impl Into<PathBuf>) -> Result<(), NodeError> {
        if self.is_started() {
            return Err(NodeError::AlreadyStarted);
        }
        let runtime = Handle::try_current().map_err(|e| NodeError::Runtime(e.to_string()))?;
        let queue_tx = self.queue_tx.clone().ok_or(NodeError::AlreadyStarted)?;

        let codec = Arc::clone(self.codec.get_or_insert_with(|| Arc::new(JsonCodec)));
        let connections = Arc::new(self.connections.clone());
        let relay = Arc::new(Relay::new(
            Arc::clone(&connections),
            Arc::clone(&codec),
            self.node_path.clone(),
            self.config.regions.clone(),
            Arc::clone(&self.metrics),
        ));

        let script_root = script_root.into();
        let hook: OnCreateHook = {
            let shared = Arc::clone(&relay);
            Arc::new(move |host: &mut dyn ScriptHost| -> zwire_common::Result<()> {
                host.init(&script_root)?;
                relay::bind_primitives(host, Arc::clone(&shared), runtime.clone())
            })
        };
        self.pool.set_on_create(hook)?;

        let queue_rx = self.queue_rx.take().ok_or(NodeError::AlreadyStarted)?;

        let mut tasks = Vec::new();
        let paths = std::iter::once(&self.node_path).chain(self.config.regions.wire_paths());
        for path in paths {
            for connection in connections.iter() {
                let watch = WatchLoop::new(
                    Arc::clone(connection),
                    path.clone(),
                    queue_tx.clone(),
                    self.errors.clone(),
                    Arc::clone(&self.metrics),
                    self.config.max_watch_failures,
                );
                tasks.push(watch.spawn());
            }
        }
        let watches = tasks.len();
        self.watch_tasks.lock().extend(tasks);

        let executor = Arc::new(CallExecutor::new(
            Arc::new(self.functions.clone()),
            Arc::clone(&self.pool),
            self.errors.clone(),
            Arc::clone(&self.metrics),
        ));
        Dispatcher::new(
            queue_rx,
            codec,
            Arc::clone(&executor),
            self.errors.clone(),
            Arc::clone(&self.metrics),
        )
        .spawn();

        self.relay = Some(relay);
        self.executor = Some(executor);
        info!(
            node = %self.node_path,
            regions = ?self.config.regions.names(),
            connections = connections.len(),
            watches,
            "Node started"
        );
        Ok(())
    }

    /// Runs one call locally and returns its result.
    ///
    /// Resolution is the same as for calls arriving from the fabric: a native
    /// binding wins, anything else runs on a pooled script context. A failure
    /// is reported to the error handler and returned.
    ///
    /// # Arguments
    /// * `name` - Handler name
    /// * `params` - Parameters passed to the handler
    ///
    /// # Errors
    /// * `NodeError::NotStarted` before [`start`](Self::start)
    /// * `NodeError::Zwire` carrying the handler or pool error
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use serde_json::json;
    /// # async fn run(node: &zwire_node::Node) -> Result<(), zwire_node::NodeError> {
    /// let pong = node.call("ping", json!({})).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn call(&self, name: &str, params: Value) -> Result<Value, NodeError> {
        let executor = self.executor.as_ref().ok_or(NodeError::NotStarted)?;
        executor.call(name, params).await.map_err(|e| {
            self.errors.report(&e);
            NodeError::from(e)
        })
    }

    /// Frees the interpreter pool and closes every connection.
    ///
    /// Each failure is reported. Calls already running are left to finish.
    pub async fn close(&mut self) {
        for (context, err) in self.pool.free().await {
            warn!(context, "Script context failed to shut down");
            self.errors.report(&err);
        }

        for connection in &self.connections {
            if let Err(e) = connection.close().await {
                self.errors.report(&e);
            }
        }

        self.queue_tx = None;
        self.queue_rx = None;
        info!(node = %self.node_path, "Node closed");
    }

    /// Waits for every watch loop started so far and returns how each ended.
    pub async fn wait(&self) -> Vec<WatchExit> {
        let tasks = std::mem::take(&mut *self.watch_tasks.lock());
        futures::future::join_all(tasks)
            .await
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(exit) => Some(exit),
                Err(e) => {
                    warn!(error = %e, "Watch task did not finish cleanly");
                    None
                }
            })
            .collect()
    }

    /// Hostname and pid this agent runs as
    pub fn identity(&self) -> &NodeIdentity {
        &self.config.identity
    }

    /// `/z-node/node/{hostname}/{pid}`, watched for calls addressed to this agent
    pub fn node_path(&self) -> &str {
        &self.node_path
    }

    /// `/z-node/info/{hostname}/{pid}`, where the liveness record is registered
    pub fn info_path(&self) -> &str {
        &self.info_path
    }

    pub fn regions(&self) -> &Regions {
        &self.config.regions
    }

    /// Connections that registered successfully
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    pub fn is_started(&self) -> bool {
        self.relay.is_some()
    }

    /// The relay primitives, once started.
    pub fn relay(&self) -> Option<Arc<Relay>> {
        self.relay.clone()
    }

    /// Point-in-time copy of the agent's counters.
    ///
    /// Calls still running when the snapshot is taken are not counted yet.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use zwire_common::MemoryFabric;

    #[test]
    fn test_paths_from_identity() {
        let node = Node::with_config(NodeConfig::with_identity(
            NodeIdentity::new("alpha", 42),
            Regions::new(["eu"]),
        ));
        assert_eq!(node.node_path(), "/z-node/node/alpha/42");
        assert_eq!(node.info_path(), "/z-node/info/alpha/42");
        assert_eq!(node.regions().wire_paths(), &["/z-node/eu/wire".to_string()]);
        assert!(!node.is_started());
    }

    #[test]
    fn test_bind_rejects_empty_name() {
        let mut node = Node::new("alpha", ["eu"]);
        let err = node.bind("", |_params| Ok(Value::Null)).unwrap_err();
        assert!(matches!(err, NodeError::EmptyName));
    }

    #[test]
    fn test_start_needs_runtime() {
        let mut node = Node::new("alpha", ["eu"]);
        assert!(matches!(node.start("scripts"), Err(NodeError::Runtime(_))));
        assert!(!node.is_started());
    }

    #[tokio::test]
    async fn test_call_before_start() {
        let mut node = Node::new("alpha", ["eu"]);
        node.bind("ping", |_params| Ok(json!("pong"))).unwrap();
        assert!(matches!(
            node.call("ping", json!(null)).await,
            Err(NodeError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_lifecycle_after_start() {
        let fabric = MemoryFabric::new();
        let mut node = Node::new("alpha", Vec::<String>::new());
        node.add_connection(Arc::new(fabric.connect())).await.unwrap();
        assert!(fabric.get(node.info_path()).is_some());

        let dir = tempfile::tempdir().unwrap();
        node.start(dir.path()).unwrap();
        assert!(node.is_started());
        assert!(matches!(node.start(dir.path()), Err(NodeError::AlreadyStarted)));
        assert!(matches!(
            node.bind("late", |_params| Ok(json!(null))),
            Err(NodeError::AlreadyStarted)
        ));
        assert!(matches!(
            node.add_connection(Arc::new(fabric.connect())).await,
            Err(NodeError::AlreadyStarted)
        ));

        node.close().await;
        assert!(fabric.get(node.info_path()).is_none());
        let exits = node.wait().await;
        // node path + the default wire
        assert_eq!(exits, vec![WatchExit::ConnectionLost; 2]);
    }
}
