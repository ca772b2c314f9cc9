use std::path::PathBuf;

use clap::{Parser, Subcommand};

use weave_common::HarnessConfig;

/// sqlweave — deterministic multi-session SQL interleaving harness
#[derive(Debug, Parser)]
#[command(name = "sqlweave", about = "Drive interleaved multi-session SQL scripts", version)]
pub struct Args {
    /// Data source name, e.g. sqlite:scratch.db
    #[arg(long, env = "SQLWEAVE_DSN", default_value = "sqlite:sqlweave.db")]
    pub dsn: String,

    /// Timeout for a single script evaluation in ms (0 = no timeout)
    #[arg(long, default_value_t = 60_000)]
    pub timeout_ms: i64,

    /// Max wait before a fresh statement counts as blocked, in ms (0 = forever)
    #[arg(long, default_value_t = 3_000)]
    pub block_time_ms: i64,

    /// Poll slice for already-running statements, in ms (0 = forever)
    #[arg(long, default_value_t = 200)]
    pub ping_time_ms: i64,

    #[command(subcommand)]
    pub command: Cmd,
}

impl Args {
    pub fn config(&self) -> HarnessConfig {
        HarnessConfig {
            dsn: self.dsn.clone(),
            timeout_ms: self.timeout_ms,
            block_time_ms: self.block_time_ms,
            ping_time_ms: self.ping_time_ms,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Cmd {
    /// Run scripts and stream their text dump
    Play(PlayArgs),
    /// Run declarative suites against recorded expectations
    Test(TestArgs),
    /// Emit a manifest of recorded results found under a directory
    Gen(GenArgs),
}

#[derive(Debug, clap::Args)]
pub struct PlayArgs {
    /// Write <script>.result.out and <script>.result.json expectation files
    #[arg(short, long)]
    pub write: bool,

    /// Record the outputs as a negative expectation
    #[arg(short, long)]
    pub negative: bool,

    /// One-line row summaries instead of pretty-printed tables
    #[arg(long)]
    pub no_verbose: bool,

    /// Append a latency line after each completed statement
    #[arg(long)]
    pub with_lat: bool,

    /// Script files to play
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct TestArgs {
    /// Only run tests whose name contains this substring
    #[arg(short, long, default_value = "")]
    pub filter: String,

    /// List the tests that would run without running them
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Show a text diff for failed assertions when available
    #[arg(long)]
    pub diff: bool,

    /// Diff command to use with --diff
    #[arg(long, default_value = "diff -u -N --color")]
    pub diff_cmd: String,

    /// Suite files to run
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,
}

#[derive(Debug, clap::Args)]
pub struct GenArgs {
    /// Directory to scan for recorded results
    pub dir: PathBuf,
}
