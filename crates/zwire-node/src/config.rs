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

use zwire_common::{NodeIdentity, Regions};
use zwire_metrics::MetricsConfig;

use crate::runtime::PoolConfig;

/// Default capacity of the delivery queue
pub const DEFAULT_QUEUE_SIZE: usize = 16;

/// Consecutive non-connection watch failures tolerated per watch loop
pub const MAX_WATCH_FAILURES: u32 = 5;

/// Agent configuration
#[derive(Clone, Debug)]
pub struct NodeConfig {
    pub identity: NodeIdentity,
    pub regions: Regions,
    pub queue_size: usize,
    pub max_watch_failures: u32,
    pub pool: PoolConfig,
    pub metrics: MetricsConfig,
}

impl NodeConfig {
    /// Configuration for this process on `hostname`, watching `regions`.
    pub fn new<I, S>(hostname: impl Into<String>, regions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_identity(NodeIdentity::current(hostname), Regions::new(regions))
    }

    pub fn with_identity(identity: NodeIdentity, regions: Regions) -> Self {
        Self {
            identity,
            regions,
            queue_size: DEFAULT_QUEUE_SIZE,
            max_watch_failures: MAX_WATCH_FAILURES,
            pool: PoolConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }

    pub fn queue_size(mut self, queue_size: usize) -> Self {
        self.queue_size = queue_size;
        self
    }

    pub fn max_watch_failures(mut self, max_watch_failures: u32) -> Self {
        self.max_watch_failures = max_watch_failures;
        self
    }

    pub fn pool_size(mut self, pool_size: usize) -> Self {
        self.pool.pool_size = pool_size;
        self
    }

    /// Caps how many distinct call names the metrics table keeps.
    pub fn max_tracked_calls(mut self, max_calls: usize) -> Self {
        self.metrics.max_calls = max_calls;
        self
    }
}
