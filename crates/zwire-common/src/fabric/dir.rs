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
use notify::{Event, EventKind, RecursiveMode, Watcher};
use parking_lot::Mutex;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{mpsc, watch};

use super::wait_closed;
use crate::connection::{Connection, DeliveryQueue};
use crate::protocol::{Result, ZwireError};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Directory-backed coordination fabric.
///
/// Fabric path `/a/b/c` is stored as the file `<root>/a/b/c`. Writes go
/// through a temporary file and a rename so a watcher never reads a
/// half-written payload. Agent processes pointed at the same root share one
/// fabric.
#[derive(Debug, Clone)]
pub struct DirFabric {
    root: PathBuf,
}

impl DirFabric {
    /// Opens (creating if needed) a fabric rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Opens a new session on this fabric.
    pub fn connect(&self) -> DirConnection {
        let (closed, _) = watch::channel(false);
        DirConnection {
            fabric: self.clone(),
            closed,
            registered: Mutex::new(Vec::new()),
        }
    }

    /// File backing a fabric path.
    pub fn file_for(&self, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path.trim_start_matches('/'));
        let valid = relative.components().count() > 0
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !valid {
            return Err(ZwireError::InvalidArgument(format!(
                "'{}' is not a valid fabric path",
                path
            )));
        }
        Ok(self.root.join(relative))
    }

    /// Current payload at `path`, if any.
    pub async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        let file = self.file_for(path)?;
        match tokio::fs::read(&file).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &str, payload: &[u8]) -> Result<PathBuf> {
        let file = self.file_for(path)?;
        let parent = file
            .parent()
            .ok_or_else(|| ZwireError::InvalidArgument(format!("'{}' has no parent", path)))?;
        tokio::fs::create_dir_all(parent).await?;

        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = parent.join(format!(
            ".{}.{}.{}.tmp",
            name,
            std::process::id(),
            TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
        ));
        tokio::fs::write(&temp, payload).await?;
        tokio::fs::rename(&temp, &file).await?;
        Ok(file)
    }
}

/// One session on a [`DirFabric`].
///
/// Registered records are removed again when the session closes.
pub struct DirConnection {
    fabric: DirFabric,
    closed: watch::Sender<bool>,
    registered: Mutex<Vec<PathBuf>>,
}

impl DirConnection {
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

/// Whether `event` announces new contents for `target`.
fn touches(event: &Event, target: &Path) -> bool {
    let relevant_kind = matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_));
    relevant_kind
        && event
            .paths
            .iter()
            .any(|p| p.file_name().is_some() && p.file_name() == target.file_name())
}

#[async_trait]
impl Connection for DirConnection {
    async fn register(&self, path: &str, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        let file = self.fabric.write(path, payload).await?;
        self.registered.lock().push(file);
        Ok(())
    }

    async fn watch(&self, path: &str, deliver: &DeliveryQueue) -> Result<()> {
        self.ensure_open()?;
        let target = self.fabric.file_for(path)?;
        let parent = target
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| ZwireError::InvalidArgument(format!("'{}' has no parent", path)))?;
        tokio::fs::create_dir_all(&parent).await?;

        let (tx, mut events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            // the receiver is gone once this watch has returned
            let _ = tx.send(res);
        })?;
        watcher.watch(&parent, RecursiveMode::NonRecursive)?;

        let closed = wait_closed(self.closed.subscribe());
        tokio::pin!(closed);

        let data = loop {
            tokio::select! {
                event = events.recv() => match event {
                    Some(Ok(event)) if touches(&event, &target) => {
                        match tokio::fs::read(&target).await {
                            Ok(data) => break data,
                            // replaced again between the event and the read
                            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                            Err(e) => return Err(e.into()),
                        }
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(ZwireError::Fabric(format!("watcher for {} stopped", path))),
                },
                _ = &mut closed => return Err(ZwireError::ConnectionLost),
            }
        };
        drop(watcher);

        tracing::debug!(path, bytes = data.len(), "directory fabric delivery");
        deliver.send(data).await.map_err(|_| ZwireError::QueueClosed)
    }

    async fn set(&self, path: &str, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        self.fabric.write(path, payload).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.closed.send_replace(true) {
            return Ok(());
        }
        let registered = std::mem::take(&mut *self.registered.lock());
        let mut first_error = None;
        for file in registered {
            if let Err(e) = tokio::fs::remove_file(&file).await {
                if e.kind() != std::io::ErrorKind::NotFound && first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_for_maps_under_root() {
        let dir = tempfile::tempdir().unwrap();
        let fabric = DirFabric::new(dir.path()).unwrap();
        let file = fabric.file_for("/z-node/eu/wire").unwrap();
        assert_eq!(file, dir.path().join("z-node/eu/wire"));
    }

    #[test]
    fn test_file_for_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let fabric = DirFabric::new(dir.path()).unwrap();
        assert!(fabric.file_for("/z-node/../../etc/passwd").is_err());
        assert!(fabric.file_for("/").is_err());
    }

    #[tokio::test]
    async fn test_set_and_get() {
        let dir = tempfile::tempdir().unwrap();
        let fabric = DirFabric::new(dir.path()).unwrap();
        let conn = fabric.connect();

        conn.set("/z-node/eu/wire", b"payload").await.unwrap();
        assert_eq!(
            fabric.get("/z-node/eu/wire").await.unwrap(),
            Some(b"payload".to_vec())
        );
        assert_eq!(fabric.get("/z-node/us/wire").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_registration_removed_on_close() {
        let dir = tempfile::tempdir().unwrap();
        let fabric = DirFabric::new(dir.path()).unwrap();
        let conn = fabric.connect();

        conn.register("/z-node/info/alpha/1", b"now").await.unwrap();
        assert!(fabric.get("/z-node/info/alpha/1").await.unwrap().is_some());

        conn.close().await.unwrap();
        assert!(fabric.get("/z-node/info/alpha/1").await.unwrap().is_none());
        assert!(conn.set("/p", b"x").await.unwrap_err().is_connection_level());
    }
}
