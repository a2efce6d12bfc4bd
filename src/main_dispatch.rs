use tradelab::cli::{Cli, Commands};
use tradelab::config::AppConfig;
use tradelab::error::Result;

pub(crate) async fn run(cli: &Cli) -> Result<()> {
    let config = AppConfig::load_from(&cli.config_dir, cli.config.as_deref())?;

    match &cli.command {
        Commands::Run(args) => {
            crate::main_runtime::init_logging(&config.logging);
            crate::main_commands::run::run_experiment(config, args).await?;
        }
        Commands::Generate {
            kind,
            rows,
            seed,
            output,
            start,
        } => {
            crate::main_runtime::init_logging_simple();
            crate::main_commands::generate::run_generate(*kind, *rows, *seed, *start, output)?;
        }
        Commands::Info { json } => {
            crate::main_runtime::init_logging_simple();
            crate::main_commands::info::run_info(&config, *json)?;
        }
    }

    Ok(())
}
