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

//! # zwire CLI Entry Point
//!
//! ## Usage
//!
//! ```bash
//! # Run an agent against a shared directory fabric
//! zwire node -s scripts/ -f /tmp/zwire -r eu -r us
//!
//! # Broadcast a call on a region's wire
//! zwire send -f /tmp/zwire hello -a '{"who": "bob"}' --region eu
//!
//! # Address one agent directly
//! zwire send -f /tmp/zwire hello --host alpha --pid 4242
//! ```

use anyhow::Result;
use argh::FromArgs;
use std::sync::Arc;
use zwire_common::DirFabric;
use zwire_node::{Node, NodeConfig};

use zwire_cli::{parse_params, resolve_hostname, send_call, Target};

#[derive(FromArgs)]
/// zwire - script-driven agents on a shared coordination fabric
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Node(NodeArgs),
    Send(SendArgs),
}

/// Arguments for running an agent.
///
/// The agent registers under `/z-node/info/{hostname}/{pid}`, watches its own
/// node path plus one wire per region, and runs incoming calls on the
/// handlers its scripts register with `zwire.register(name, function)`.
#[derive(FromArgs)]
#[argh(subcommand, name = "node")]
/// run a zwire agent
struct NodeArgs {
    /// script file, or directory whose .js files are loaded in name order
    #[argh(option, short = 's')]
    script: String,

    /// root directory of the fabric shared with other agents
    #[argh(option, short = 'f')]
    fabric: String,

    /// hostname used in this agent's paths
    ///
    /// Falls back to ZWIRE_HOSTNAME, then HOSTNAME, then "localhost".
    #[argh(option)]
    hostname: Option<String>,

    /// region to watch; repeat for several (default: "default")
    #[argh(option, short = 'r', long = "region")]
    regions: Vec<String>,

    /// number of script interpreters (default: one per CPU)
    #[argh(option, long = "pool-size")]
    pool_size: Option<usize>,

    /// capacity of the delivery queue
    #[argh(option, long = "queue-size", default = "zwire_node::DEFAULT_QUEUE_SIZE")]
    queue_size: usize,
}

/// Arguments for writing a single call into the fabric.
///
/// Without `--region` or `--host`/`--pid` the call goes to the wire of the
/// `default` region.
#[derive(FromArgs)]
#[argh(subcommand, name = "send")]
/// write one call into a fabric
struct SendArgs {
    /// root directory of the fabric
    #[argh(option, short = 'f')]
    fabric: String,

    /// name of the call
    #[argh(positional)]
    name: String,

    /// JSON parameters of the call
    #[argh(option, short = 'a', long = "args", default = "\"{}\".into()")]
    args: String,

    /// region whose wire receives the call
    #[argh(option)]
    region: Option<String>,

    /// hostname of the agent receiving the call
    #[argh(option)]
    host: Option<String>,

    /// process id of the agent receiving the call
    #[argh(option)]
    pid: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Set default log level to INFO, but allow RUST_LOG env var to override
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    match cli.command {
        Commands::Node(args) => run_node(args).await,
        Commands::Send(args) => run_send(args).await,
    }
}

async fn run_node(args: NodeArgs) -> Result<()> {
    let hostname = resolve_hostname(args.hostname);
    let mut config = NodeConfig::new(hostname, args.regions).queue_size(args.queue_size);
    if let Some(pool_size) = args.pool_size {
        config = config.pool_size(pool_size);
    }
    tracing::info!(
        hostname = config.identity.hostname(),
        pid = config.identity.pid(),
        regions = ?config.regions.names(),
        pool_size = config.pool.pool_size,
        "Starting zwire node with script: {}",
        args.script
    );

    let fabric = DirFabric::new(&args.fabric)?;
    tracing::info!("Using fabric at {}", fabric.root().display());

    let mut node = Node::with_config(config);
    node.add_connection(Arc::new(fabric.connect())).await?;
    node.start(&args.script)?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    node.close().await;
    for exit in node.wait().await {
        tracing::debug!(?exit, "Watch loop finished");
    }

    let metrics = serde_json::to_string(&node.metrics())?;
    tracing::info!("Final metrics: {}", metrics);
    Ok(())
}

async fn run_send(args: SendArgs) -> Result<()> {
    let params = parse_params(&args.args)?;
    let target = Target::from_flags(args.region, args.host, args.pid)?;
    let fabric = DirFabric::new(&args.fabric)?;

    let path = send_call(&fabric, &target, &args.name, params).await?;
    tracing::info!("Sent '{}' to {}", args.name, path);
    Ok(())
}
