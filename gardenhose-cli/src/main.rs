//! ## gardenhose-cli
//! **`gardenhose` binary**
//!
//! Subscribes to the filtered post stream and feeds batches to the
//! classification service until interrupted with Ctrl-C or the stream fails
//! for good. Every configuration option can be set with a flag; flags win
//! over `GARDENHOSE_*` environment variables, which win over the YAML file.

use std::process::ExitCode;

use clap::Parser;

mod commands;

use commands::Cli;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    commands::run(cli).await
}
