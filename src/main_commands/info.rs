use tradelab::cli::print_kv;
use tradelab::config::AppConfig;
use tradelab::error::{Result, TradelabError};
use tradelab::rl::{experiment_code, ReturnSeries};

pub(crate) fn run_info(config: &AppConfig, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
    } else {
        println!("{}", config.to_toml()?);
    }

    if let Err(errors) = config.validate() {
        return Err(TradelabError::Validation(errors.join("; ")));
    }

    // The code depends on the asset count, so the series has to be readable
    match ReturnSeries::from_csv(&config.market.input_path) {
        Ok(series) => print_kv(
            "experiment_code",
            &experiment_code(
                series.assets().len(),
                config.learner.kind,
                &config.costs,
                config.market.window,
                config.controller.kind,
            ),
        ),
        Err(e) => print_kv("experiment_code", &format!("unavailable ({e})")),
    }
    Ok(())
}
