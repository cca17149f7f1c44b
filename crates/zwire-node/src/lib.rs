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

//! zwire Node
//!
//! The agent that joins a coordination fabric. A [`Node`]:
//!
//! - registers a liveness record under `/z-node/info/{hostname}/{pid}` through
//!   every connection it is given;
//! - watches its own path `/z-node/node/{hostname}/{pid}` and one wire path
//!   per configured region for encoded [`CallDescriptor`](zwire_common::CallDescriptor)s;
//! - runs each call on a native handler bound with [`Node::bind`], or, when
//!   none is bound, on a script handler inside a pooled Boa interpreter;
//! - lets scripts write further calls back into the fabric through
//!   `zwire.setOnWire`, `zwire.setOnSelf` and `zwire.setOnNode`.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use zwire_common::MemoryFabric;
//! use zwire_node::Node;
//!
//! # async fn run() -> Result<(), zwire_node::NodeError> {
//! let fabric = MemoryFabric::new();
//! let mut node = Node::new("alpha", ["eu"])
//!     .with_error_handler(|err| eprintln!("zwire: {err}"));
//!
//! node.bind("ping", |_params| Ok(json!("pong")))?;
//! node.add_connection(Arc::new(fabric.connect())).await?;
//! node.start("scripts/")?;
//!
//! // ... later
//! node.close().await;
//! node.wait().await;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod functions;
pub mod handler;
pub mod node;
pub mod relay;
pub mod runtime;
pub mod watcher;

pub use config::{NodeConfig, DEFAULT_QUEUE_SIZE, MAX_WATCH_FAILURES};
pub use error::{ErrorHandler, NodeError};
pub use functions::{FunctionTable, NativeFn};
pub use handler::Resolution;
pub use node::Node;
pub use relay::Relay;
pub use runtime::{BoaPool, InterpreterPool, PoolConfig, ScriptContext, ScriptHost};
pub use watcher::WatchExit;
