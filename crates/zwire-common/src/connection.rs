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
use tokio::sync::mpsc;

use crate::protocol::Result;

/// Sending half of an agent's bounded delivery queue.
pub type DeliveryQueue = mpsc::Sender<Vec<u8>>;

/// One session with the coordination fabric.
///
/// Implementations return [`ZwireError::ConnectionLost`](crate::ZwireError::ConnectionLost)
/// once the session is unusable; any other error is treated as transient by
/// callers.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Writes a presence record at `path`.
    ///
    /// The record lives as long as the session does.
    async fn register(&self, path: &str, payload: &[u8]) -> Result<()>;

    /// Waits for the next change of `path` and pushes its payload into `deliver`.
    ///
    /// A watch is single-shot: it returns after one delivery (or failure) and
    /// must be issued again to observe the next change.
    async fn watch(&self, path: &str, deliver: &DeliveryQueue) -> Result<()>;

    /// Writes `payload` at `path`, notifying its watchers.
    async fn set(&self, path: &str, payload: &[u8]) -> Result<()>;

    /// Ends the session.
    async fn close(&self) -> Result<()>;
}
