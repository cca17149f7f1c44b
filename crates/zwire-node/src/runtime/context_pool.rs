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

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use zwire_common::{Result, ZwireError};

use crate::runtime::worker::ScriptWorker;
use crate::runtime::{ContextId, InterpreterPool, OnCreateHook, ScriptContext};

/// Configuration for the interpreter pool
#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Upper bound on live interpreters, and so on concurrent script calls
    pub pool_size: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        let pool_size = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self { pool_size }
    }
}

/// Boa-backed [`InterpreterPool`].
///
/// Interpreters are created lazily, one OS thread each, up to `pool_size`.
/// The on-create hook runs inside the new interpreter before it serves its
/// first call. Acquiring waits while every interpreter is leased.
pub struct BoaPool {
    config: PoolConfig,
    hook: Mutex<Option<OnCreateHook>>,
    workers: Mutex<HashMap<ContextId, Arc<ScriptWorker>>>,
    idle: Mutex<Vec<ContextId>>,
    permits: Arc<Semaphore>,
    next_id: AtomicU64,
    closed: AtomicBool,
}

impl BoaPool {
    pub fn new(config: PoolConfig) -> Self {
        let pool_size = config.pool_size.max(1);
        Self {
            config: PoolConfig { pool_size },
            hook: Mutex::new(None),
            workers: Mutex::new(HashMap::new()),
            idle: Mutex::new(Vec::new()),
            permits: Arc::new(Semaphore::new(pool_size)),
            next_id: AtomicU64::new(1),
            closed: AtomicBool::new(false),
        }
    }

    pub fn pool_size(&self) -> usize {
        self.config.pool_size
    }

    /// Number of interpreters created and not yet torn down
    pub fn live_contexts(&self) -> usize {
        self.workers.lock().len()
    }

    /// Number of interpreters waiting for work
    pub fn idle_contexts(&self) -> usize {
        self.idle.lock().len()
    }

    fn take_idle(&self) -> Option<Arc<ScriptWorker>> {
        loop {
            let id = self.idle.lock().pop()?;
            if let Some(worker) = self.workers.lock().get(&id).cloned() {
                return Some(worker);
            }
        }
    }

    async fn create(&self) -> Result<Arc<ScriptWorker>> {
        let hook = self.hook.lock().clone();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let worker = Arc::new(ScriptWorker::spawn(id, hook).await?);
        self.workers.lock().insert(id, Arc::clone(&worker));
        tracing::debug!(context = id, "Created script context");
        Ok(worker)
    }
}

impl Default for BoaPool {
    fn default() -> Self {
        Self::new(PoolConfig::default())
    }
}

#[async_trait]
impl InterpreterPool for BoaPool {
    fn set_on_create(&self, hook: OnCreateHook) -> Result<()> {
        let mut slot = self.hook.lock();
        if slot.is_some() {
            return Err(ZwireError::Pool("on-create hook already installed".into()));
        }
        *slot = Some(hook);
        Ok(())
    }

    async fn acquire(&self) -> Result<Box<dyn ScriptContext>> {
        if self.closed.load(Ordering::Acquire) {
            return Err(ZwireError::Pool("pool is closed".into()));
        }

        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| ZwireError::Pool("pool is closed".into()))?;

        let worker = match self.take_idle() {
            Some(worker) => worker,
            None => self.create().await?,
        };

        Ok(Box::new(BoaContext {
            worker,
            _permit: permit,
        }))
    }

    fn release(&self, context: Box<dyn ScriptContext>) {
        let id = context.id();
        let alive = self
            .workers
            .lock()
            .get(&id)
            .map(|worker| worker.is_alive());

        match alive {
            Some(true) if !self.closed.load(Ordering::Acquire) => self.idle.lock().push(id),
            Some(_) => {
                self.workers.lock().remove(&id);
                tracing::warn!(context = id, "Discarded dead script context");
            }
            None => {}
        }
        // dropping the context returns its permit
        drop(context);
    }

    async fn free(&self) -> HashMap<ContextId, ZwireError> {
        self.closed.store(true, Ordering::Release);
        self.permits.close();
        self.idle.lock().clear();

        let workers: Vec<_> = self.workers.lock().drain().collect();
        let mut errors = HashMap::new();
        for (id, worker) in workers {
            if let Err(e) = worker.shutdown().await {
                errors.insert(id, e);
            }
        }
        errors
    }
}

struct BoaContext {
    worker: Arc<ScriptWorker>,
    _permit: OwnedSemaphorePermit,
}

#[async_trait]
impl ScriptContext for BoaContext {
    fn id(&self) -> ContextId {
        self.worker.id()
    }

    async fn exec(&mut self, name: &str, params: Value) -> Result<Value> {
        self.worker.exec(name, params).await
    }
}
