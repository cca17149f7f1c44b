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

//! Script runtime
//!
//! Calls without a native handler run inside pooled JavaScript interpreters.
//! The agent only depends on the traits below; [`BoaPool`] is the Boa-backed
//! implementation used by default.

pub mod context;
pub mod context_pool;

mod bindings;
mod conversions;
mod worker;

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use zwire_common::{Result, ZwireError};

pub use context::BoaHost;
pub use context_pool::{BoaPool, PoolConfig};

/// Identifier of one pooled interpreter
pub type ContextId = u64;

/// Host function a script can call; receives the script arguments as JSON.
pub type ScriptFn = Arc<dyn Fn(Vec<Value>) -> Result<Value> + Send + Sync>;

/// Runs once against every interpreter the pool creates, before first use.
pub type OnCreateHook = Arc<dyn Fn(&mut dyn ScriptHost) -> Result<()> + Send + Sync>;

/// What an on-create hook can do to a fresh interpreter.
pub trait ScriptHost {
    /// Load the scripts found at `script_root`.
    fn init(&mut self, script_root: &Path) -> Result<()>;

    /// Expose `function` to scripts under `name`.
    fn bind(&mut self, name: &str, function: ScriptFn) -> Result<()>;
}

/// One interpreter leased from a pool.
#[async_trait]
pub trait ScriptContext: Send {
    fn id(&self) -> ContextId;

    /// Run the handler a script registered for `name`.
    async fn exec(&mut self, name: &str, params: Value) -> Result<Value>;
}

/// A pool of interpreters.
///
/// Every acquired context must be handed back through [`release`](Self::release),
/// whatever the outcome of the call it served.
#[async_trait]
pub trait InterpreterPool: Send + Sync {
    /// Install the on-create hook. A pool accepts exactly one.
    fn set_on_create(&self, hook: OnCreateHook) -> Result<()>;

    async fn acquire(&self) -> Result<Box<dyn ScriptContext>>;

    fn release(&self, context: Box<dyn ScriptContext>);

    /// Tear down every interpreter, returning the failures by context.
    async fn free(&self) -> HashMap<ContextId, ZwireError>;
}
