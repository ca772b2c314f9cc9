mod args;
mod db;
mod gen;
mod paths;
mod play;

use std::process;

use anyhow::Result;
use clap::Parser;

use args::{Args, Cmd};

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run() {
        eprintln!("sqlweave: error: {:#}", e);
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let args = Args::parse();
    let cfg = args.config();
    match &args.command {
        Cmd::Play(play_args) => play::run_play(&cfg, play_args),
        Cmd::Test(test_args) => test::run_test(&cfg, test_args),
        Cmd::Gen(gen_args) => gen::run_gen(gen_args),
    }
}
