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

//! zwire Metrics Collection
//!
//! Counters an agent keeps about its own traffic: deliveries pulled off the
//! queue, decode failures, calls per handler tier, watch failures and relay
//! writes. Hot-path counters are plain atomics; the per-call-name table sits
//! behind a `RwLock` and is capped by [`MetricsConfig`].
//!
//! ```rust
//! use zwire_metrics::{CallTier, NodeMetricsCollector};
//!
//! let metrics = NodeMetricsCollector::new();
//! metrics.record_delivery();
//! metrics.record_call("ping", CallTier::Native, true);
//!
//! let snapshot = metrics.snapshot();
//! assert_eq!(snapshot.native_calls, 1);
//! ```

mod collector;
mod snapshot;

pub use collector::{CallTier, MetricsConfig, NodeMetricsCollector, DEFAULT_MAX_CALLS};
pub use snapshot::{CallMetrics, MetricsSnapshot};
