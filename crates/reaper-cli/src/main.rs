mod bootstrap_helpers;
mod cli_args;
mod startup;

use anyhow::Result;
use clap::Parser;

use crate::cli_args::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    bootstrap_helpers::load_dotenv();
    let cli = Cli::parse();
    bootstrap_helpers::init_tracing();
    startup::run_cli(cli).await
}
