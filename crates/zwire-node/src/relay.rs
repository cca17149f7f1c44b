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

//! Relay primitives.
//!
//! Scripts reach the fabric only through these three writes. Each one builds
//! a [`CallDescriptor`], encodes it once and writes the bytes through every
//! connection in insertion order, stopping at the first failure.

use serde_json::Value;
use std::sync::Arc;
use tokio::runtime::Handle;
use zwire_common::{paths, CallDescriptor, Codec, Connection, Regions, Result, ZwireError};
use zwire_metrics::NodeMetricsCollector;

use crate::runtime::{ScriptFn, ScriptHost};

/// Script-facing name of [`Relay::to_wire`]
pub const SET_ON_WIRE: &str = "setOnWire";
/// Script-facing name of [`Relay::to_self`]
pub const SET_ON_SELF: &str = "setOnSelf";
/// Script-facing name of [`Relay::to_node`]
pub const SET_ON_NODE: &str = "setOnNode";

/// Writes calls from scripts (or embedding code) back into the fabric.
///
/// Every write goes through every connection of the agent, in the order the
/// connections were added. A failing write stops the fan-out and is returned
/// to the caller; writes already made stay in place.
///
/// # Example
///
/// ```no_run
/// # use serde_json::json;
/// # async fn run(node: &zwire_node::Node) -> zwire_common::Result<()> {
/// if let Some(relay) = node.relay() {
///     relay.to_wire("*", "sync", json!({"round": 1})).await?;
///     relay.to_node("beta", 4242, "ping", json!(null)).await?;
/// }
/// # Ok(())
/// # }
/// ```
pub struct Relay {
    connections: Arc<Vec<Arc<dyn Connection>>>,
    codec: Arc<dyn Codec>,
    node_path: String,
    regions: Regions,
    metrics: Arc<NodeMetricsCollector>,
}

impl Relay {
    /// Creates a relay over a frozen connection set.
    ///
    /// # Arguments
    /// * `connections` - Connections every write is sent through
    /// * `codec` - Codec used to encode each call descriptor
    /// * `node_path` - This agent's own path, the target of [`to_self`](Self::to_self)
    /// * `regions` - Configured regions, used to expand the `*` wildcard
    /// * `metrics` - Collector receiving the count of successful writes
    pub fn new(
        connections: Arc<Vec<Arc<dyn Connection>>>,
        codec: Arc<dyn Codec>,
        node_path: String,
        regions: Regions,
        metrics: Arc<NodeMetricsCollector>,
    ) -> Self {
        Self {
            connections,
            codec,
            node_path,
            regions,
            metrics,
        }
    }

    /// Write a call to `region`'s wire, or to every configured wire for `*`.
    ///
    /// A region this agent does not watch is still accepted.
    ///
    /// # Errors
    /// Returns the codec error, or the first write error from any connection.
    pub async fn to_wire(&self, region: &str, name: &str, params: Value) -> Result<()> {
        let payload = self.encode(name, params)?;
        self.fan_out(&self.regions.resolve(region), &payload).await
    }

    /// Write a call to this node's own path.
    pub async fn to_self(&self, name: &str, params: Value) -> Result<()> {
        let payload = self.encode(name, params)?;
        self.fan_out(std::slice::from_ref(&self.node_path), &payload)
            .await
    }

    /// Write a call to the path of the node `hostname`/`pid`.
    pub async fn to_node(&self, hostname: &str, pid: u32, name: &str, params: Value) -> Result<()> {
        let payload = self.encode(name, params)?;
        self.fan_out(&[paths::node_path(hostname, pid)], &payload)
            .await
    }

    /// Number of connections each write fans out to
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    fn encode(&self, name: &str, params: Value) -> Result<Vec<u8>> {
        self.codec.encode(&CallDescriptor::new(name, params))
    }

    async fn fan_out(&self, targets: &[String], payload: &[u8]) -> Result<()> {
        let mut writes = 0;
        let mut result = Ok(());
        'connections: for connection in self.connections.iter() {
            for path in targets {
                if let Err(e) = connection.set(path, payload).await {
                    result = Err(e);
                    break 'connections;
                }
                writes += 1;
                tracing::debug!(path = %path, "Relayed call");
            }
        }
        self.metrics.record_relay_writes(writes);
        result
    }
}

/// Expose the relay to scripts as `zwire.setOnWire`, `zwire.setOnSelf` and
/// `zwire.setOnNode`.
///
/// The primitives run on interpreter threads and block them on `runtime`
/// until every write has finished.
pub fn bind_primitives(host: &mut dyn ScriptHost, relay: Arc<Relay>, runtime: Handle) -> Result<()> {
    let wire: ScriptFn = {
        let relay = Arc::clone(&relay);
        let runtime = runtime.clone();
        Arc::new(move |args: Vec<Value>| -> Result<Value> {
            let region = string_arg(&args, 0, "region")?;
            let name = string_arg(&args, 1, "name")?;
            let params = params_arg(&args, 2);
            block_on(&runtime, relay.to_wire(&region, &name, params))?;
            Ok(Value::Null)
        })
    };

    let own: ScriptFn = {
        let relay = Arc::clone(&relay);
        let runtime = runtime.clone();
        Arc::new(move |args: Vec<Value>| -> Result<Value> {
            let name = string_arg(&args, 0, "name")?;
            let params = params_arg(&args, 1);
            block_on(&runtime, relay.to_self(&name, params))?;
            Ok(Value::Null)
        })
    };

    let node: ScriptFn = Arc::new(move |args: Vec<Value>| -> Result<Value> {
        let hostname = string_arg(&args, 0, "hostname")?;
        let pid = args
            .get(1)
            .and_then(Value::as_u64)
            .and_then(|pid| u32::try_from(pid).ok())
            .ok_or_else(|| ZwireError::InvalidArgument("pid must be a process id".into()))?;
        let name = string_arg(&args, 2, "name")?;
        let params = params_arg(&args, 3);
        block_on(&runtime, relay.to_node(&hostname, pid, &name, params))?;
        Ok(Value::Null)
    });

    host.bind(SET_ON_WIRE, wire)?;
    host.bind(SET_ON_SELF, own)?;
    host.bind(SET_ON_NODE, node)?;
    Ok(())
}

fn block_on<F>(runtime: &Handle, write: F) -> Result<()>
where
    F: std::future::Future<Output = Result<()>>,
{
    if Handle::try_current().is_ok() {
        return Err(ZwireError::Script(
            "relay primitives cannot block inside the async runtime".into(),
        ));
    }
    runtime.block_on(write)
}

fn string_arg(args: &[Value], index: usize, what: &str) -> Result<String> {
    args.get(index)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| ZwireError::InvalidArgument(format!("{} must be a non-empty string", what)))
}

fn params_arg(args: &[Value], index: usize) -> Value {
    args.get(index).cloned().unwrap_or(Value::Null)
}
