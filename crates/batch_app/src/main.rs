mod cli;
mod config;
mod controls;
mod logging;
mod render;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    cli::run(args)
}
