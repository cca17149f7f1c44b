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

//! Ready-made coordination fabrics.
//!
//! - [`MemoryFabric`]: an in-process store, used for embedding several agents
//!   in one process and for tests
//! - [`DirFabric`]: a directory-backed store watched with `notify`, shared by
//!   agent processes on one host

pub mod dir;
pub mod memory;

pub use dir::{DirConnection, DirFabric};
pub use memory::{MemoryConnection, MemoryFabric};

use tokio::sync::watch;

/// Resolves once the session flag flips to closed (or its owner is gone).
pub(crate) async fn wait_closed(mut closed: watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}
