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
use tokio::sync::mpsc;
use zwire_common::Codec;
use zwire_metrics::NodeMetricsCollector;

use crate::error::ErrorReporter;
use crate::handler::CallExecutor;

/// Single consumer of the delivery queue.
///
/// Every decoded call runs in its own task, so a slow handler never holds up
/// the queue.
pub struct Dispatcher {
    queue: mpsc::Receiver<Vec<u8>>,
    codec: Arc<dyn Codec>,
    executor: Arc<CallExecutor>,
    errors: ErrorReporter,
    metrics: Arc<NodeMetricsCollector>,
}

impl Dispatcher {
    /// # Arguments
    /// * `queue` - Receiving half of the agent's delivery queue
    /// * `codec` - Codec that turns payloads back into call descriptors
    /// * `executor` - Runs each decoded call
    /// * `errors` - Receives decode failures
    /// * `metrics` - Counts deliveries and decode failures
    pub fn new(
        queue: mpsc::Receiver<Vec<u8>>,
        codec: Arc<dyn Codec>,
        executor: Arc<CallExecutor>,
        errors: ErrorReporter,
        metrics: Arc<NodeMetricsCollector>,
    ) -> Self {
        Self {
            queue,
            codec,
            executor,
            errors,
            metrics,
        }
    }

    /// Starts the loop on the current runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Runs until every sender of the queue has been dropped.
    pub async fn run(mut self) {
        while let Some(payload) = self.queue.recv().await {
            self.metrics.record_delivery();

            let call = match self.codec.decode(&payload) {
                Ok(call) => call,
                Err(e) => {
                    self.metrics.record_decode_failure();
                    self.errors.report(&e);
                    continue;
                }
            };

            tracing::debug!(name = %call.name, "Dispatching call");
            let executor = Arc::clone(&self.executor);
            tokio::spawn(async move {
                executor.execute(call).await;
            });
        }
        tracing::info!("Delivery queue closed, dispatcher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::FunctionTable;
    use crate::runtime::{BoaPool, PoolConfig};
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;
    use zwire_common::{CallDescriptor, JsonCodec, Result, ZwireError};

    #[tokio::test]
    async fn test_decodes_and_runs_calls_then_stops() {
        let hits = Arc::new(AtomicUsize::new(0));
        let done = Arc::new(Notify::new());
        let mut functions = FunctionTable::new();
        {
            let hits = Arc::clone(&hits);
            let done = Arc::clone(&done);
            functions
                .bind(
                    "count",
                    Arc::new(move |_params: Value| -> Result<Value> {
                        if hits.fetch_add(1, Ordering::SeqCst) == 1 {
                            done.notify_one();
                        }
                        Ok(Value::Null)
                    }),
                )
                .unwrap();
        }

        let reported = Arc::new(AtomicUsize::new(0));
        let errors = {
            let reported = Arc::clone(&reported);
            ErrorReporter::new(Some(Arc::new(move |_err: &ZwireError| {
                reported.fetch_add(1, Ordering::SeqCst);
            })))
        };
        let metrics = Arc::new(NodeMetricsCollector::new());
        let executor = Arc::new(CallExecutor::new(
            Arc::new(functions),
            Arc::new(BoaPool::new(PoolConfig { pool_size: 1 })),
            errors.clone(),
            Arc::clone(&metrics),
        ));

        let (tx, rx) = mpsc::channel(4);
        let handle = Dispatcher::new(rx, Arc::new(JsonCodec), executor, errors, Arc::clone(&metrics)).spawn();

        let call = JsonCodec.encode(&CallDescriptor::new("count", json!({}))).unwrap();
        tx.send(call.clone()).await.unwrap();
        tx.send(b"not json".to_vec()).await.unwrap();
        tx.send(call).await.unwrap();
        drop(tx);

        handle.await.unwrap();
        done.notified().await;

        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(reported.load(Ordering::SeqCst), 1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.deliveries, 3);
        assert_eq!(snapshot.decode_failures, 1);
    }
}
