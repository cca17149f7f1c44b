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

//! Path templates shared by every agent on a fabric.
//!
//! | path | template |
//! |------|----------|
//! | wire | `/z-node/{region}/wire` |
//! | node | `/z-node/node/{hostname}/{pid}` |
//! | info | `/z-node/info/{hostname}/{pid}` |
//!
//! These strings are the contract with the coordination service and with
//! other agents, so they must not change shape.

/// Root of every path this crate produces
pub const ROOT: &str = "/z-node";

/// Region used when an agent is constructed without any
pub const DEFAULT_REGION: &str = "default";

/// Region name meaning "every configured region" in a wire relay
pub const WILDCARD_REGION: &str = "*";

/// Path a region's broadcast calls are written to.
pub fn wire_path(region: &str) -> String {
    format!("{}/{}/wire", ROOT, region)
}

/// Path calls addressed to one node are written to.
pub fn node_path(hostname: &str, pid: u32) -> String {
    format!("{}/node/{}/{}", ROOT, hostname, pid)
}

/// Path an agent's liveness record is registered under.
pub fn info_path(hostname: &str, pid: u32) -> String {
    format!("{}/info/{}/{}", ROOT, hostname, pid)
}

/// Host identity of one running agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeIdentity {
    hostname: String,
    pid: u32,
}

impl NodeIdentity {
    pub fn new(hostname: impl Into<String>, pid: u32) -> Self {
        Self {
            hostname: hostname.into(),
            pid,
        }
    }

    /// Identity of the calling process on `hostname`.
    pub fn current(hostname: impl Into<String>) -> Self {
        Self::new(hostname, std::process::id())
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn node_path(&self) -> String {
        node_path(&self.hostname, self.pid)
    }

    pub fn info_path(&self) -> String {
        info_path(&self.hostname, self.pid)
    }
}

/// Configured regions, normalized once.
///
/// Keeps region names next to their wire paths so a wildcard relay can
/// address every region without re-deriving anything.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Regions {
    names: Vec<String>,
    wires: Vec<String>,
}

impl Regions {
    /// Normalizes `names`, falling back to [`DEFAULT_REGION`] when empty.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            names.push(DEFAULT_REGION.to_string());
        }
        let wires = names.iter().map(|name| wire_path(name)).collect();
        Self { names, wires }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn wire_paths(&self) -> &[String] {
        &self.wires
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Wire paths a relay to `region` must be written to.
    pub fn resolve(&self, region: &str) -> Vec<String> {
        if region == WILDCARD_REGION {
            self.wires.clone()
        } else {
            vec![wire_path(region)]
        }
    }
}

impl Default for Regions {
    fn default() -> Self {
        Self::new(Vec::<String>::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_templates() {
        assert_eq!(wire_path("eu"), "/z-node/eu/wire");
        assert_eq!(node_path("alpha", 42), "/z-node/node/alpha/42");
        assert_eq!(info_path("alpha", 42), "/z-node/info/alpha/42");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = NodeIdentity::new("alpha", 7);
        let b = NodeIdentity::new("alpha", 7);
        assert_eq!(a.node_path(), b.node_path());
        assert_eq!(a.info_path(), b.info_path());
        assert_eq!(a.node_path(), a.node_path());
        assert_eq!(wire_path("eu"), wire_path("eu"));
    }

    #[test]
    fn test_node_and_info_paths_differ() {
        let id = NodeIdentity::new("alpha", 7);
        assert_ne!(id.node_path(), id.info_path());
    }

    #[test]
    fn test_current_uses_process_id() {
        let id = NodeIdentity::current("alpha");
        assert_eq!(id.pid(), std::process::id());
        assert_eq!(id.hostname(), "alpha");
    }

    #[test]
    fn test_empty_regions_default() {
        let regions = Regions::new(Vec::<String>::new());
        assert_eq!(regions.names(), &["default".to_string()]);
        assert_eq!(regions.wire_paths(), &["/z-node/default/wire".to_string()]);
    }

    #[test]
    fn test_regions_keep_order() {
        let regions = Regions::new(["eu", "us"]);
        assert_eq!(
            regions.wire_paths(),
            &["/z-node/eu/wire".to_string(), "/z-node/us/wire".to_string()]
        );
    }

    #[test]
    fn test_resolve_wildcard_and_single() {
        let regions = Regions::new(["eu", "us"]);
        assert_eq!(regions.resolve("*"), regions.wire_paths().to_vec());
        assert_eq!(regions.resolve("us"), vec!["/z-node/us/wire".to_string()]);
        // unconfigured regions are still addressable
        assert_eq!(regions.resolve("ap"), vec!["/z-node/ap/wire".to_string()]);
    }
}
