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

//! Agent lifecycle scenarios against fake connections and pools.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use zwire_common::{
    CallDescriptor, Codec, Connection, DeliveryQueue, JsonCodec, MemoryFabric, NodeIdentity,
    Regions, Result, ZwireError,
};
use zwire_node::runtime::{ContextId, OnCreateHook};
use zwire_node::{InterpreterPool, Node, NodeConfig, NodeError, ScriptContext, WatchExit};

/// Pool that only counts how often it is used.
#[derive(Default)]
struct CountingPool {
    acquired: AtomicUsize,
    hooks: AtomicUsize,
    fail_free: bool,
}

struct NullContext;

#[async_trait]
impl ScriptContext for NullContext {
    fn id(&self) -> ContextId {
        0
    }

    async fn exec(&mut self, name: &str, _params: Value) -> Result<Value> {
        Err(ZwireError::UnknownHandler(name.to_string()))
    }
}

#[async_trait]
impl InterpreterPool for CountingPool {
    fn set_on_create(&self, _hook: OnCreateHook) -> Result<()> {
        self.hooks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn acquire(&self) -> Result<Box<dyn ScriptContext>> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(NullContext))
    }

    fn release(&self, _context: Box<dyn ScriptContext>) {}

    async fn free(&self) -> HashMap<ContextId, ZwireError> {
        let mut failures = HashMap::new();
        if self.fail_free {
            failures.insert(7, ZwireError::Pool("context 7 wedged".into()));
        }
        failures
    }
}

/// Connection whose watches end at once with a lost session, recording the
/// paths they were issued for.
#[derive(Default)]
struct RecordingConnection {
    reject_register: bool,
    fail_close: bool,
    closes: AtomicUsize,
    registered: Mutex<Vec<String>>,
    watched: Mutex<Vec<String>>,
    sets: Mutex<Vec<String>>,
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn register(&self, path: &str, _payload: &[u8]) -> Result<()> {
        if self.reject_register {
            return Err(ZwireError::Fabric("registration refused".into()));
        }
        self.registered.lock().push(path.to_string());
        Ok(())
    }

    async fn watch(&self, path: &str, _deliver: &DeliveryQueue) -> Result<()> {
        self.watched.lock().push(path.to_string());
        Err(ZwireError::ConnectionLost)
    }

    async fn set(&self, path: &str, _payload: &[u8]) -> Result<()> {
        self.sets.lock().push(path.to_string());
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(ZwireError::Fabric("close refused".into()));
        }
        Ok(())
    }
}

fn collecting_node(config: NodeConfig) -> (Node, Arc<Mutex<Vec<String>>>) {
    let reported = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&reported);
    let node = Node::with_config(config).with_error_handler(move |err| {
        sink.lock().push(err.to_string());
    });
    (node, reported)
}

fn encoded(name: &str, params: Value) -> Vec<u8> {
    JsonCodec
        .encode(&CallDescriptor::new(name, params))
        .expect("descriptor encodes")
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_native_ping_never_touches_pool() {
    let fabric = MemoryFabric::new();
    let pool = Arc::new(CountingPool::default());
    let (node, reported) = collecting_node(NodeConfig::with_identity(
        NodeIdentity::new("alpha", 1),
        Regions::new(["eu"]),
    ));
    let mut node = node.with_pool(pool.clone());

    let (tx, mut rx) = mpsc::unbounded_channel();
    node.bind("ping", move |params| {
        let _ = tx.send(params);
        Ok(json!("pong"))
    })
    .unwrap();

    node.add_connection(Arc::new(fabric.connect())).await.unwrap();
    node.start("unused").unwrap();
    assert_eq!(pool.hooks.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let writer = fabric.connect();
    writer
        .set(node.node_path(), &encoded("ping", json!({"seq": 1})))
        .await
        .unwrap();

    let params = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("ping delivered")
        .expect("handler alive");
    assert_eq!(params, json!({"seq": 1}));
    assert_eq!(pool.acquired.load(Ordering::SeqCst), 0);

    // the handler runs before the call is recorded
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while node.metrics().native_calls == 0 && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    node.close().await;
    node.wait().await;
    assert!(reported.lock().is_empty());

    let metrics = node.metrics();
    assert_eq!(metrics.native_calls, 1);
    assert_eq!(metrics.script_calls, 0);
}

#[tokio::test]
async fn test_local_call_resolves_like_fabric_calls() {
    let pool = Arc::new(CountingPool::default());
    let (node, reported) = collecting_node(NodeConfig::new("alpha", ["eu"]));
    let mut node = node.with_pool(pool.clone());
    node.bind("ping", |params| Ok(json!({"pong": params}))).unwrap();
    node.start("unused").unwrap();

    let result = node.call("ping", json!(1)).await.unwrap();
    assert_eq!(result, json!({"pong": 1}));
    assert_eq!(pool.acquired.load(Ordering::SeqCst), 0);

    let err = node.call("nobody", json!(null)).await.unwrap_err();
    assert!(matches!(err, NodeError::Zwire(ZwireError::UnknownHandler(name)) if name == "nobody"));
    assert_eq!(pool.acquired.load(Ordering::SeqCst), 1);
    assert_eq!(reported.lock().len(), 1);

    let metrics = node.metrics();
    assert_eq!(metrics.native_calls, 1);
    assert_eq!(metrics.script_calls, 1);
    assert_eq!(metrics.failed_calls, 1);
    node.close().await;
}

#[tokio::test]
async fn test_close_reports_each_teardown_failure() {
    let pool = Arc::new(CountingPool {
        fail_free: true,
        ..Default::default()
    });
    let (node, reported) = collecting_node(NodeConfig::new("alpha", ["eu"]));
    let mut node = node.with_pool(pool);

    let first = Arc::new(RecordingConnection {
        fail_close: true,
        ..Default::default()
    });
    let second = Arc::new(RecordingConnection {
        fail_close: true,
        ..Default::default()
    });
    node.add_connection(first.clone()).await.unwrap();
    node.add_connection(second.clone()).await.unwrap();

    node.close().await;

    assert_eq!(first.closes.load(Ordering::SeqCst), 1);
    assert_eq!(second.closes.load(Ordering::SeqCst), 1);

    let reported = reported.lock().clone();
    assert_eq!(reported.len(), 3);
    assert_eq!(reported.iter().filter(|e| e.contains("wedged")).count(), 1);
    assert_eq!(reported.iter().filter(|e| e.contains("close refused")).count(), 2);
}

#[tokio::test]
async fn test_zero_regions_watch_default_wire() {
    let connection = Arc::new(RecordingConnection::default());
    let mut node = Node::with_config(NodeConfig::with_identity(
        NodeIdentity::new("alpha", 2),
        Regions::new(Vec::<String>::new()),
    ))
    .with_pool(Arc::new(CountingPool::default()));

    node.add_connection(connection.clone()).await.unwrap();
    assert_eq!(*connection.registered.lock(), vec!["/z-node/info/alpha/2".to_string()]);

    node.start("unused").unwrap();
    let exits = node.wait().await;

    assert_eq!(exits, vec![WatchExit::ConnectionLost; 2]);
    let mut watched = connection.watched.lock().clone();
    watched.sort();
    assert_eq!(
        watched,
        vec![
            "/z-node/default/wire".to_string(),
            "/z-node/node/alpha/2".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_watch_per_connection_and_path() {
    let first = Arc::new(RecordingConnection::default());
    let second = Arc::new(RecordingConnection::default());
    let mut node = Node::new("alpha", ["eu", "us"]).with_pool(Arc::new(CountingPool::default()));

    node.add_connection(first.clone()).await.unwrap();
    node.add_connection(second.clone()).await.unwrap();
    node.start("unused").unwrap();

    // (self + 2 regions) x 2 connections
    assert_eq!(node.wait().await.len(), 6);
    assert_eq!(first.watched.lock().len(), 3);
    assert_eq!(second.watched.lock().len(), 3);
}

#[tokio::test]
async fn test_failed_registration_leaves_set_empty() {
    let (node, reported) = collecting_node(NodeConfig::new("alpha", ["eu"]));
    let mut node = node.with_pool(Arc::new(CountingPool::default()));
    let refusing = Arc::new(RecordingConnection {
        reject_register: true,
        ..Default::default()
    });

    let err = node.add_connection(refusing.clone()).await.unwrap_err();
    assert!(matches!(err, NodeError::Zwire(ZwireError::Fabric(_))));
    assert_eq!(node.connection_count(), 0);
    assert_eq!(reported.lock().len(), 1);

    node.start("unused").unwrap();
    let relay = node.relay().expect("relay after start");
    relay.to_wire("*", "sync", json!({})).await.unwrap();
    assert_eq!(relay.connection_count(), 0);
    assert!(refusing.sets.lock().is_empty());

    assert!(node.wait().await.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_undecodable_payload_is_reported() {
    let fabric = MemoryFabric::new();
    let (node, reported) = collecting_node(NodeConfig::new("alpha", ["eu"]));
    let mut node = node.with_pool(Arc::new(CountingPool::default()));
    node.add_connection(Arc::new(fabric.connect())).await.unwrap();
    node.start("unused").unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    fabric
        .connect()
        .set("/z-node/eu/wire", b"{ not json")
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while reported.lock().is_empty() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    assert_eq!(reported.lock().len(), 1);
    assert!(reported.lock()[0].starts_with("Codec error"));
    node.close().await;
    node.wait().await;
    assert_eq!(node.metrics().decode_failures, 1);
}

#[tokio::test]
async fn test_relay_wildcard_reaches_every_region() {
    let connection = Arc::new(RecordingConnection::default());
    let mut node = Node::with_config(NodeConfig::with_identity(
        NodeIdentity::new("alpha", 3),
        Regions::new(["r1", "r2"]),
    ))
    .with_pool(Arc::new(CountingPool::default()));
    node.add_connection(connection.clone()).await.unwrap();
    node.start("unused").unwrap();

    let relay = node.relay().unwrap();
    relay.to_wire("*", "sync", json!({})).await.unwrap();
    relay.to_wire("r2", "sync", json!({})).await.unwrap();
    relay.to_self("tick", json!(null)).await.unwrap();
    relay.to_node("beta", 9, "tick", json!(null)).await.unwrap();

    assert_eq!(
        *connection.sets.lock(),
        vec![
            "/z-node/r1/wire".to_string(),
            "/z-node/r2/wire".to_string(),
            "/z-node/r2/wire".to_string(),
            "/z-node/node/alpha/3".to_string(),
            "/z-node/node/beta/9".to_string(),
        ]
    );
    assert_eq!(node.metrics().relay_writes, 5);
    node.wait().await;
}
