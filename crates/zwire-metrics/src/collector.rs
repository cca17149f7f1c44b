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

use crate::snapshot::{CallMetrics, MetricsSnapshot};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Default number of distinct call names tracked per agent
pub const DEFAULT_MAX_CALLS: usize = 1000;

/// Size limits for the per-name call table.
///
/// Call names arrive from fabric payloads, so the table is bounded. When a
/// new name would exceed `max_calls`, the least recently seen name is evicted.
///
/// # Example
///
/// ```rust
/// use zwire_metrics::{MetricsConfig, NodeMetricsCollector};
///
/// let metrics = NodeMetricsCollector::with_config(MetricsConfig { max_calls: 100 });
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricsConfig {
    /// Maximum number of distinct call names kept in the snapshot
    pub max_calls: usize,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            max_calls: DEFAULT_MAX_CALLS,
        }
    }
}

/// Which handler tier served a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallTier {
    Native,
    Scripted,
}

#[derive(Debug, Default)]
struct CallEntry {
    metrics: CallMetrics,
    last_seen: u64,
}

/// Thread-safe counters for one agent.
///
/// Shared behind an `Arc` by the watch loops, the dispatch loop, every call
/// task and the relay.
#[derive(Debug)]
pub struct NodeMetricsCollector {
    config: MetricsConfig,
    started: Instant,
    deliveries: AtomicU64,
    decode_failures: AtomicU64,
    native_calls: AtomicU64,
    script_calls: AtomicU64,
    failed_calls: AtomicU64,
    watch_failures: AtomicU64,
    relay_writes: AtomicU64,
    // orders entries for eviction; bumped under the `calls` write lock
    sequence: AtomicU64,
    calls: RwLock<HashMap<String, CallEntry>>,
}

impl NodeMetricsCollector {
    pub fn new() -> Self {
        Self::with_config(MetricsConfig::default())
    }

    /// Creates a collector with custom table limits.
    ///
    /// A `max_calls` of zero is treated as one.
    pub fn with_config(config: MetricsConfig) -> Self {
        Self {
            config: MetricsConfig {
                max_calls: config.max_calls.max(1),
            },
            started: Instant::now(),
            deliveries: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            native_calls: AtomicU64::new(0),
            script_calls: AtomicU64::new(0),
            failed_calls: AtomicU64::new(0),
            watch_failures: AtomicU64::new(0),
            relay_writes: AtomicU64::new(0),
            sequence: AtomicU64::new(0),
            calls: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MetricsConfig {
        &self.config
    }

    pub fn record_delivery(&self) {
        self.deliveries.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_watch_failure(&self) {
        self.watch_failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Counts `writes` successful fabric writes made by one relay call.
    pub fn record_relay_writes(&self, writes: u64) {
        self.relay_writes.fetch_add(writes, Ordering::Relaxed);
    }

    /// Records one executed call and its outcome.
    ///
    /// The tier and failure totals always count the call. The per-name entry
    /// is created on first sight, evicting the least recently seen name once
    /// the table is full.
    ///
    /// # Arguments
    /// * `name` - Call name as it arrived on the fabric
    /// * `tier` - Tier that served (or tried to serve) the call
    /// * `success` - Whether the handler returned without error
    pub fn record_call(&self, name: &str, tier: CallTier, success: bool) {
        match tier {
            CallTier::Native => self.native_calls.fetch_add(1, Ordering::Relaxed),
            CallTier::Scripted => self.script_calls.fetch_add(1, Ordering::Relaxed),
        };
        if !success {
            self.failed_calls.fetch_add(1, Ordering::Relaxed);
        }

        let mut calls = self.calls.write();
        let seen = self.sequence.fetch_add(1, Ordering::Relaxed);
        if !calls.contains_key(name) && calls.len() >= self.config.max_calls {
            let oldest = calls
                .iter()
                .min_by_key(|(_, entry)| entry.last_seen)
                .map(|(oldest, _)| oldest.clone());
            if let Some(oldest) = oldest {
                calls.remove(&oldest);
            }
        }

        let entry = calls.entry(name.to_string()).or_default();
        entry.last_seen = seen;
        entry.metrics.call_count += 1;
        if !success {
            entry.metrics.failure_count += 1;
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let calls = self
            .calls
            .read()
            .iter()
            .map(|(name, entry)| (name.clone(), entry.metrics.clone()))
            .collect();

        MetricsSnapshot {
            deliveries: self.deliveries.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            native_calls: self.native_calls.load(Ordering::Relaxed),
            script_calls: self.script_calls.load(Ordering::Relaxed),
            failed_calls: self.failed_calls.load(Ordering::Relaxed),
            watch_failures: self.watch_failures.load(Ordering::Relaxed),
            relay_writes: self.relay_writes.load(Ordering::Relaxed),
            uptime_ms: self.started.elapsed().as_millis() as u64,
            calls,
        }
    }
}

impl Default for NodeMetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_collector_is_empty() {
        let snapshot = NodeMetricsCollector::new().snapshot();
        assert_eq!(snapshot.deliveries, 0);
        assert_eq!(snapshot.native_calls + snapshot.script_calls, 0);
        assert!(snapshot.calls.is_empty());
    }

    #[test]
    fn test_record_call_by_tier() {
        let metrics = NodeMetricsCollector::new();
        metrics.record_call("ping", CallTier::Native, true);
        metrics.record_call("greet", CallTier::Scripted, false);
        metrics.record_call("greet", CallTier::Scripted, true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.native_calls, 1);
        assert_eq!(snapshot.script_calls, 2);
        assert_eq!(snapshot.failed_calls, 1);
        assert_eq!(
            snapshot.calls.get("greet"),
            Some(&CallMetrics { call_count: 2, failure_count: 1 })
        );
    }

    #[test]
    fn test_counters() {
        let metrics = NodeMetricsCollector::new();
        metrics.record_delivery();
        metrics.record_delivery();
        metrics.record_decode_failure();
        metrics.record_watch_failure();
        metrics.record_relay_writes(3);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deliveries, 2);
        assert_eq!(snapshot.decode_failures, 1);
        assert_eq!(snapshot.watch_failures, 1);
        assert_eq!(snapshot.relay_writes, 3);
    }

    #[test]
    fn test_concurrent_recording() {
        let metrics = Arc::new(NodeMetricsCollector::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let metrics = Arc::clone(&metrics);
                std::thread::spawn(move || {
                    for _ in 0..250 {
                        metrics.record_call("ping", CallTier::Native, true);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(metrics.snapshot().calls["ping"].call_count, 1000);
    }

    #[test]
    fn test_call_table_is_bounded() {
        let metrics = NodeMetricsCollector::new();
        for i in 0..(DEFAULT_MAX_CALLS * 5) {
            metrics.record_call(&format!("flood-{}", i), CallTier::Scripted, false);
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.calls.len(), DEFAULT_MAX_CALLS);
        // totals still count every call
        assert_eq!(snapshot.script_calls, (DEFAULT_MAX_CALLS * 5) as u64);
        assert_eq!(snapshot.failed_calls, (DEFAULT_MAX_CALLS * 5) as u64);
    }

    #[test]
    fn test_least_recently_seen_name_is_evicted() {
        let metrics = NodeMetricsCollector::with_config(MetricsConfig { max_calls: 2 });
        metrics.record_call("a", CallTier::Native, true);
        metrics.record_call("b", CallTier::Native, true);
        metrics.record_call("a", CallTier::Native, true);
        metrics.record_call("c", CallTier::Native, true);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.calls.len(), 2);
        assert_eq!(snapshot.calls["a"].call_count, 2);
        assert!(snapshot.calls.contains_key("c"));
        assert!(!snapshot.calls.contains_key("b"));
    }

    #[test]
    fn test_zero_limit_keeps_one_name() {
        let metrics = NodeMetricsCollector::with_config(MetricsConfig { max_calls: 0 });
        assert_eq!(metrics.config().max_calls, 1);
        metrics.record_call("a", CallTier::Native, true);
        metrics.record_call("b", CallTier::Native, true);
        assert_eq!(metrics.snapshot().calls.len(), 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let metrics = NodeMetricsCollector::new();
        metrics.record_call("ping", CallTier::Native, true);
        let json = serde_json::to_value(metrics.snapshot()).unwrap();
        assert_eq!(json["native_calls"], 1);
        assert_eq!(json["calls"]["ping"]["call_count"], 1);
    }
}
