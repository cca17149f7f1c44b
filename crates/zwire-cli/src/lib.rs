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

//! # zwire CLI
//!
//! Helpers behind the `zwire` binary:
//!
//! - **Hostname resolution** for the agent identity
//! - **Send**: write one call descriptor into a directory fabric
//!
//! The binary itself lives in `main.rs` and only parses arguments and wires
//! these pieces to [`zwire_node::Node`].

use anyhow::{anyhow, Result};
use serde_json::Value;
use zwire_common::{paths, CallDescriptor, Codec, Connection, DirFabric, JsonCodec};

/// Environment variable consulted first for the agent hostname
pub const HOSTNAME_ENV: &str = "ZWIRE_HOSTNAME";

/// Picks the agent hostname: explicit flag, then `ZWIRE_HOSTNAME`, then
/// `HOSTNAME`, then `localhost`. Empty values are skipped.
pub fn resolve_hostname(explicit: Option<String>) -> String {
    hostname_from(explicit, |key| std::env::var(key).ok())
}

fn hostname_from<F>(explicit: Option<String>, env: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    let non_empty = |name: Option<String>| name.filter(|name| !name.is_empty());
    non_empty(explicit)
        .or_else(|| non_empty(env(HOSTNAME_ENV)))
        .or_else(|| non_empty(env("HOSTNAME")))
        .unwrap_or_else(|| "localhost".to_string())
}

/// Parses call parameters given on the command line.
pub fn parse_params(raw: &str) -> Result<Value> {
    serde_json::from_str(raw).map_err(|e| anyhow!("Invalid JSON in args: {}", e))
}

/// Where `zwire send` writes its call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Wire(String),
    Node { hostname: String, pid: u32 },
}

impl Target {
    /// Builds a target from the mutually exclusive `--region` and
    /// `--host`/`--pid` flags. Neither means the default region.
    pub fn from_flags(region: Option<String>, host: Option<String>, pid: Option<u32>) -> Result<Self> {
        match (region, host, pid) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                Err(anyhow!("--region cannot be combined with --host/--pid"))
            }
            (Some(region), None, None) => Ok(Target::Wire(region)),
            (None, Some(hostname), Some(pid)) => Ok(Target::Node { hostname, pid }),
            (None, Some(_), None) | (None, None, Some(_)) => {
                Err(anyhow!("--host and --pid must be given together"))
            }
            (None, None, None) => Ok(Target::Wire(paths::DEFAULT_REGION.to_string())),
        }
    }

    pub fn path(&self) -> String {
        match self {
            Target::Wire(region) => paths::wire_path(region),
            Target::Node { hostname, pid } => paths::node_path(hostname, *pid),
        }
    }
}

/// Writes one call into `fabric` and returns the path it was written to.
pub async fn send_call(fabric: &DirFabric, target: &Target, name: &str, params: Value) -> Result<String> {
    let payload = JsonCodec.encode(&CallDescriptor::new(name, params))?;
    let path = target.path();

    let connection = fabric.connect();
    connection.set(&path, &payload).await?;
    connection.close().await?;
    Ok(path)
}
