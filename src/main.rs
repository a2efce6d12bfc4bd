use clap::Parser;
use tradelab::cli::Cli;
use tradelab::error::Result;

mod main_commands;
mod main_dispatch;
mod main_runtime;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    main_dispatch::run(&cli).await
}
