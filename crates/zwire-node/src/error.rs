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
use thiserror::Error;
use zwire_common::ZwireError;

/// Misuse of the agent lifecycle.
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Node already started")]
    AlreadyStarted,

    #[error("Node not started")]
    NotStarted,

    #[error("Handler name must not be empty")]
    EmptyName,

    #[error("No async runtime available: {0}")]
    Runtime(String),

    #[error(transparent)]
    Zwire(#[from] ZwireError),
}

/// Callback receiving every recoverable error the agent reports.
pub type ErrorHandler = Arc<dyn Fn(&ZwireError) + Send + Sync>;

/// Reports recoverable errors to the log and the optional handler.
#[derive(Clone, Default)]
pub struct ErrorReporter {
    handler: Option<ErrorHandler>,
}

impl ErrorReporter {
    pub fn new(handler: Option<ErrorHandler>) -> Self {
        Self { handler }
    }

    pub fn report(&self, err: &ZwireError) {
        tracing::warn!(error = %err, "Reported error");
        if let Some(handler) = &self.handler {
            handler(err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_report_without_handler_is_silent() {
        ErrorReporter::default().report(&ZwireError::QueueClosed);
    }

    #[test]
    fn test_report_reaches_handler() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let reporter = ErrorReporter::new(Some(Arc::new(move |err: &ZwireError| {
            sink.lock().push(err.to_string());
        })));

        reporter.report(&ZwireError::Fabric("down".into()));
        assert_eq!(seen.lock().as_slice(), ["Fabric error: down"]);
    }
}
