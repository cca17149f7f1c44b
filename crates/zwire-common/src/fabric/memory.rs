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
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

use super::wait_closed;
use crate::connection::{Connection, DeliveryQueue};
use crate::protocol::{Result, ZwireError};

type Slot = watch::Sender<Option<Arc<Vec<u8>>>>;

/// In-process hierarchical key/value store with one-shot watches.
///
/// Every path is backed by a `tokio::sync::watch` slot, so a watcher observes
/// the latest payload written after it subscribed; several writes landing
/// before the watcher wakes coalesce into one delivery.
///
/// # Example
///
/// ```
/// use zwire_common::MemoryFabric;
///
/// let fabric = MemoryFabric::new();
/// let a = fabric.connect();
/// let b = fabric.connect();
/// // `a` and `b` share the same store
/// ```
#[derive(Clone, Default)]
pub struct MemoryFabric {
    slots: Arc<Mutex<HashMap<String, Slot>>>,
}

impl MemoryFabric {
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new session on this fabric.
    pub fn connect(&self) -> MemoryConnection {
        let (closed, _) = watch::channel(false);
        MemoryConnection {
            fabric: self.clone(),
            closed,
            registered: Mutex::new(Vec::new()),
        }
    }

    /// Current payload at `path`, if any.
    pub fn get(&self, path: &str) -> Option<Vec<u8>> {
        let slots = self.slots.lock();
        slots
            .get(path)
            .and_then(|slot| slot.borrow().as_ref().map(|data| data.to_vec()))
    }

    /// Paths currently holding a payload, sorted.
    pub fn paths(&self) -> Vec<String> {
        let slots = self.slots.lock();
        let mut paths: Vec<String> = slots
            .iter()
            .filter(|(_, slot)| slot.borrow().is_some())
            .map(|(path, _)| path.clone())
            .collect();
        paths.sort();
        paths
    }

    fn subscribe(&self, path: &str) -> watch::Receiver<Option<Arc<Vec<u8>>>> {
        let mut slots = self.slots.lock();
        slots
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(None).0)
            .subscribe()
    }

    fn store(&self, path: &str, payload: Option<Vec<u8>>) {
        let mut slots = self.slots.lock();
        let slot = slots
            .entry(path.to_string())
            .or_insert_with(|| watch::channel(None).0);
        slot.send_replace(payload.map(Arc::new));
    }
}

/// One session on a [`MemoryFabric`].
///
/// Registered records are ephemeral: closing the session removes them.
pub struct MemoryConnection {
    fabric: MemoryFabric,
    closed: watch::Sender<bool>,
    registered: Mutex<Vec<String>>,
}

impl MemoryConnection {
    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(ZwireError::ConnectionLost)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    async fn register(&self, path: &str, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.fabric.store(path, Some(payload.to_vec()));
        self.registered.lock().push(path.to_string());
        Ok(())
    }

    async fn watch(&self, path: &str, deliver: &DeliveryQueue) -> Result<()> {
        let mut changes = self.fabric.subscribe(path);
        self.ensure_open()?;

        let closed = wait_closed(self.closed.subscribe());
        tokio::pin!(closed);

        let data = loop {
            tokio::select! {
                changed = changes.changed() => {
                    changed.map_err(|_| ZwireError::Fabric(format!("slot for {} dropped", path)))?;
                    let current = changes.borrow_and_update().clone();
                    // removals wake watchers too; keep waiting for a payload
                    if let Some(data) = current {
                        break data;
                    }
                }
                _ = &mut closed => return Err(ZwireError::ConnectionLost),
            }
        };

        tracing::debug!(path, bytes = data.len(), "memory fabric delivery");
        deliver
            .send(data.to_vec())
            .await
            .map_err(|_| ZwireError::QueueClosed)
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.fabric.store(path, Some(payload.to_vec()));
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        let registered = std::mem::take(&mut *self.registered.lock());
        for path in registered {
            self.fabric.store(&path, None);
        }
        Ok(())
    }
}
