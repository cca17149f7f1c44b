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

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Counters for one call name
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CallMetrics {
    pub call_count: u64,
    pub failure_count: u64,
}

/// Point-in-time copy of an agent's counters
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub deliveries: u64,
    pub decode_failures: u64,
    pub native_calls: u64,
    pub script_calls: u64,
    pub failed_calls: u64,
    pub watch_failures: u64,
    pub relay_writes: u64,
    pub uptime_ms: u64,
    pub calls: HashMap<String, CallMetrics>,
}
