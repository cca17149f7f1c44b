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

use std::sync::Arc;
use tracing::{debug, info, warn};
use zwire_common::{Connection, DeliveryQueue, ZwireError};
use zwire_metrics::NodeMetricsCollector;

use crate::error::ErrorReporter;

/// Why a watch loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchExit {
    /// The connection reported a connection-level failure.
    ConnectionLost,
    /// Too many consecutive transient failures.
    FailureCeiling,
    /// The dispatch side is gone.
    QueueClosed,
}

/// Keeps one (connection, path) watch armed.
///
/// Watches are one-shot, so the loop re-arms after every delivery. A
/// connection-level failure ends the loop at once. Other failures are
/// reported and retried until `max_failures` of them happen in a row.
pub struct WatchLoop {
    connection: Arc<dyn Connection>,
    path: String,
    queue: DeliveryQueue,
    errors: ErrorReporter,
    metrics: Arc<NodeMetricsCollector>,
    max_failures: u32,
}

impl WatchLoop {
    pub fn new(
        connection: Arc<dyn Connection>,
        path: String,
        queue: DeliveryQueue,
        errors: ErrorReporter,
        metrics: Arc<NodeMetricsCollector>,
        max_failures: u32,
    ) -> Self {
        Self {
            connection,
            path,
            queue,
            errors,
            metrics,
            max_failures,
        }
    }

    /// Starts the loop on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<WatchExit> {
        tokio::spawn(self.run())
    }

    /// Runs the loop to completion and tells why it stopped.
    pub async fn run(self) -> WatchExit {
        let mut failures = 0u32;

        loop {
            match self.connection.watch(&self.path, &self.queue).await {
                Ok(()) => {
                    failures = 0;
                    if self.queue.is_closed() {
                        info!(path = %self.path, "Delivery queue closed, stopping watch");
                        return WatchExit::QueueClosed;
                    }
                    debug!(path = %self.path, "Re-arming watch");
                }
                Err(e) if e.is_connection_level() => {
                    info!(path = %self.path, error = %e, "Connection lost, stopping watch");
                    return WatchExit::ConnectionLost;
                }
                Err(ZwireError::QueueClosed) => {
                    info!(path = %self.path, "Delivery queue closed, stopping watch");
                    return WatchExit::QueueClosed;
                }
                Err(e) => {
                    failures += 1;
                    self.metrics.record_watch_failure();
                    self.errors.report(&e);

                    if failures >= self.max_failures {
                        warn!(
                            path = %self.path,
                            failures,
                            "Watch failed too many times in a row, giving up"
                        );
                        return WatchExit::FailureCeiling;
                    }
                }
            }
        }
    }
}
