mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use crate::cli::{Cli, Command};

fn init_tracing() {
    let env_filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    match Cli::parse().command {
        Command::Run(args) => commands::execute_run(args).await,
        Command::Keygen => commands::execute_keygen(),
        Command::Seal(args) => commands::execute_seal(args),
        Command::Open(args) => commands::execute_open(args),
        Command::DecodeAudit(args) => commands::execute_decode_audit(args),
    }
}
