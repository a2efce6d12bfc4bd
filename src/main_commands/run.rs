use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tabled::Tabled;
use tracing::info;

use tradelab::cli::{print_items, print_success, OutputMode, RunArgs};
use tradelab::config::AppConfig;
use tradelab::error::{Result, TradelabError};
use tradelab::rl::{
    experiment_code, run_experiments, write_results, RepetitionSummary, ReturnSeries,
};

#[derive(Debug, Serialize, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Run")]
    run: usize,
    #[tabled(rename = "Epochs")]
    epochs: usize,
    #[tabled(rename = "Train Avg")]
    train_average: String,
    #[tabled(rename = "Train Sharpe")]
    train_sharpe: String,
    #[tabled(rename = "Test Steps")]
    test_steps: usize,
    #[tabled(rename = "Test LogRet")]
    test_log_return: String,
    #[tabled(rename = "Test Sharpe")]
    test_sharpe: String,
}

impl From<RepetitionSummary> for SummaryRow {
    fn from(s: RepetitionSummary) -> Self {
        Self {
            run: s.index,
            epochs: s.epochs,
            train_average: format!("{:.6}", s.final_average),
            train_sharpe: format!("{:.4}", s.final_sharpe),
            test_steps: s.backtest_steps,
            test_log_return: format!("{:.6}", s.backtest_log_return),
            test_sharpe: format!("{:.4}", s.backtest_sharpe),
        }
    }
}

pub(crate) async fn run_experiment(mut config: AppConfig, args: &RunArgs) -> Result<()> {
    args.apply(&mut config);
    if let Err(errors) = config.validate() {
        return Err(TradelabError::Validation(errors.join("; ")));
    }

    let series = ReturnSeries::from_csv(&config.market.input_path)?;
    let code = experiment_code(
        series.assets().len(),
        config.learner.kind,
        &config.costs,
        config.market.window,
        config.controller.kind,
    );
    let out_dir = Path::new(&config.experiment.output_dir).join(&code);
    std::fs::create_dir_all(&out_dir)?;
    std::fs::write(out_dir.join("parameters.toml"), config.to_toml()?)?;

    info!(
        experiment = %code,
        input = %config.market.input_path,
        rows = series.len(),
        repetitions = config.experiment.num_experiments,
        "Experiment started"
    );

    let results =
        run_experiments(Arc::new(series), Arc::new(config.experiment_settings())).await?;
    write_results(&out_dir, &results)?;

    let summaries: Vec<RepetitionSummary> = results.iter().map(|r| r.summary()).collect();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    } else {
        let rows: Vec<SummaryRow> = summaries.into_iter().map(SummaryRow::from).collect();
        print_items(&rows, OutputMode::Table)?;
        print_success(&format!("Results written to {}", out_dir.display()));
    }
    Ok(())
}
