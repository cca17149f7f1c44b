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

//! Two-tier call resolution.
//!
//! A name bound in the [`FunctionTable`] always wins; only names without a
//! native binding reach the interpreter pool.

use serde_json::Value;
use std::sync::Arc;
use zwire_common::{CallDescriptor, Result, ZwireError};
use zwire_metrics::{CallTier, NodeMetricsCollector};

use crate::error::ErrorReporter;
use crate::functions::{FunctionTable, NativeFn};
use crate::runtime::{InterpreterPool, ScriptContext};

/// Where a call name is served.
#[derive(Clone)]
pub enum Resolution {
    Native(NativeFn),
    Scripted,
}

impl Resolution {
    pub fn resolve(functions: &FunctionTable, name: &str) -> Self {
        match functions.get(name) {
            Some(function) => Resolution::Native(function),
            None => Resolution::Scripted,
        }
    }

    pub fn tier(&self) -> CallTier {
        match self {
            Resolution::Native(_) => CallTier::Native,
            Resolution::Scripted => CallTier::Scripted,
        }
    }
}

/// Runs decoded calls against the frozen function table and the pool.
pub struct CallExecutor {
    functions: Arc<FunctionTable>,
    pool: Arc<dyn InterpreterPool>,
    errors: ErrorReporter,
    metrics: Arc<NodeMetricsCollector>,
}

impl CallExecutor {
    pub fn new(
        functions: Arc<FunctionTable>,
        pool: Arc<dyn InterpreterPool>,
        errors: ErrorReporter,
        metrics: Arc<NodeMetricsCollector>,
    ) -> Self {
        Self {
            functions,
            pool,
            errors,
            metrics,
        }
    }

    /// Execute one call. Results are discarded; failures are reported.
    pub async fn execute(&self, call: CallDescriptor) {
        let CallDescriptor { name, params } = call;
        if let Err(e) = self.call(&name, params).await {
            self.errors.report(&e);
        }
    }

    /// Runs `name` with `params` and hands back the handler's result.
    ///
    /// A native binding for `name` is called directly and the pool is never
    /// touched. Any other name runs on a leased script context, which goes
    /// back to the pool however the call ends.
    ///
    /// # Errors
    /// Returns the handler's error, `ZwireError::UnknownHandler` when no
    /// script registered `name`, or the pool's acquisition error.
    pub async fn call(&self, name: &str, params: Value) -> Result<Value> {
        let resolution = Resolution::resolve(&self.functions, name);
        let tier = resolution.tier();

        tracing::debug!(name = %name, ?tier, "Executing call");
        let result = match resolution {
            Resolution::Native(function) => function(params),
            Resolution::Scripted => self.exec_scripted(name, params).await,
        };

        self.metrics.record_call(name, tier, result.is_ok());
        result
    }

    async fn exec_scripted(&self, name: &str, params: Value) -> Result<Value> {
        let context = self.pool.acquire().await?;
        let mut lease = Lease {
            pool: self.pool.as_ref(),
            context: Some(context),
        };
        lease.exec(name, params).await
    }
}

/// Returns its context to the pool when dropped, whatever happened in between.
struct Lease<'a> {
    pool: &'a dyn InterpreterPool,
    context: Option<Box<dyn ScriptContext>>,
}

impl Lease<'_> {
    async fn exec(&mut self, name: &str, params: Value) -> Result<Value> {
        match self.context.as_mut() {
            Some(context) => context.exec(name, params).await,
            None => Err(ZwireError::Pool("context already released".into())),
        }
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        if let Some(context) = self.context.take() {
            self.pool.release(context);
        }
    }
}
