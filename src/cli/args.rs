use std::{net::IpAddr, path::PathBuf};

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Evaluate traffic against security plans of inbound and outbound permit rules"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Load a configuration file and validate every plan and rule in it
    Validate {
        /// Path to configuration file (TOML)
        #[arg(long = "config", value_name = "PATH")]
        config: PathBuf,
    },
    /// Evaluate a single simulated request and print the decision
    Simulate(SimulateArgs),
    /// Evaluate synthetic traffic continuously until interrupted
    Live(LiveArgs),
}

#[derive(ClapArgs, Debug)]
pub struct SimulateArgs {
    /// Path to configuration file (TOML)
    #[arg(long = "config", value_name = "PATH")]
    pub config: PathBuf,

    /// Plan id or name
    #[arg(long = "plan")]
    pub plan: String,

    /// Source address (destination address with --outbound)
    #[arg(long = "ip")]
    pub ip: IpAddr,

    #[arg(long = "method", default_value = "GET")]
    pub method: String,

    /// Request path or URL; an https:// URL implies port 443
    #[arg(long = "path", default_value = "/")]
    pub path: String,

    /// TCP, UDP or ICMP (default TCP)
    #[arg(long = "protocol")]
    pub protocol: Option<String>,

    #[arg(long = "port")]
    pub port: Option<u16>,

    /// Evaluate against the plan's outbound rules
    #[arg(long = "outbound")]
    pub outbound: bool,

    /// Exit with status 1 when the request is blocked
    #[arg(long = "fail-on-block")]
    pub fail_on_block: bool,
}

#[derive(ClapArgs, Debug)]
pub struct LiveArgs {
    /// Path to configuration file (TOML)
    #[arg(long = "config", value_name = "PATH")]
    pub config: PathBuf,

    /// Plan id or name
    #[arg(long = "plan")]
    pub plan: String,

    /// Stop after this many events (overrides feed.count)
    #[arg(long = "count")]
    pub count: Option<u64>,

    /// Delay between events in milliseconds (overrides feed.interval_ms)
    #[arg(long = "interval-ms")]
    pub interval_ms: Option<u64>,

    /// Width of the reported time buckets in seconds (overrides feed.bucket_secs)
    #[arg(long = "bucket-secs")]
    pub bucket_secs: Option<i64>,

    /// Seed for reproducible traffic (overrides feed.seed)
    #[arg(long = "seed")]
    pub seed: Option<u64>,
}
