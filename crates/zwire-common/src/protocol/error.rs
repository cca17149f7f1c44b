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

use thiserror::Error;

/// Every recoverable failure the agent can surface.
///
/// [`ZwireError::ConnectionLost`] is the only connection-level variant: it
/// means the session behind a [`Connection`](crate::Connection) is unusable
/// and nothing issued through it will succeed again.
#[derive(Error, Debug)]
pub enum ZwireError {
    #[error("Connection lost")]
    ConnectionLost,

    #[error("Codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("Fabric error: {0}")]
    Fabric(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Handler '{name}' failed: {message}")]
    Handler { name: String, message: String },

    #[error("No handler named '{0}'")]
    UnknownHandler(String),

    #[error("Script error: {0}")]
    Script(String),

    #[error("Interpreter pool error: {0}")]
    Pool(String),

    #[error("Delivery queue closed")]
    QueueClosed,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

impl ZwireError {
    /// Returns `true` when the session itself is unusable.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, ZwireError::ConnectionLost)
    }

    /// Builds a [`ZwireError::Handler`] for a failed native handler.
    pub fn handler(name: impl Into<String>, message: impl std::fmt::Display) -> Self {
        ZwireError::Handler {
            name: name.into(),
            message: message.to_string(),
        }
    }
}

impl From<notify::Error> for ZwireError {
    fn from(err: notify::Error) -> Self {
        ZwireError::Fabric(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ZwireError>;
