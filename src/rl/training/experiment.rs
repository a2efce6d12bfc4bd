//! Asset Allocation Experiment
//!
//! Independent repetitions of train-then-backtest runs. Each repetition owns
//! its learner, controller and task; repetitions run concurrently as
//! blocking tasks and share only the immutable return series.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::{Result, TradelabError};
use crate::rl::algorithms::{NpgpeLearner, NpgpeSnapshot};
use crate::rl::config::{ControllerKind, CostConfig, LearnerKind, NpgpeConfig, RLConfig};
use crate::rl::core::{build_controller, Environment};
use crate::rl::environment::{AllocationTask, MarketEnvironment, ReturnSeries};
use crate::rl::training::report::{BacktestReport, ConvergenceReport};
use crate::rl::training::trading_system::TradingSystem;

/// Everything a repetition needs besides the data
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentSettings {
    pub rl: RLConfig,
    /// Per-step return of the risk-free asset
    pub risk_free_rate: f64,
    /// Number of past return rows in an observation
    pub window: usize,
}

/// Output directory name, e.g. `Single_RN_P5_F0_S0_N10_softmax`
pub fn experiment_code(
    num_risky: usize,
    learner: LearnerKind,
    costs: &CostConfig,
    window: usize,
    controller: ControllerKind,
) -> String {
    let bp = |x: f64| (x * 10_000.0).round() as i64;
    format!(
        "{}_{}_P{}_F{}_S{}_N{}_{}",
        if num_risky > 1 { "Multi" } else { "Single" },
        learner.code(),
        bp(costs.delta_p),
        bp(costs.delta_f),
        bp(costs.delta_s),
        window,
        controller.as_str()
    )
}

/// Outcome of one repetition
#[derive(Debug)]
pub struct RepetitionResult {
    pub index: usize,
    pub convergence: ConvergenceReport,
    pub backtest: BacktestReport,
    pub snapshot: NpgpeSnapshot,
}

/// Headline numbers of a repetition
#[derive(Debug, Clone, Serialize)]
pub struct RepetitionSummary {
    pub index: usize,
    pub epochs: usize,
    pub final_average: f64,
    pub final_sharpe: f64,
    pub backtest_steps: usize,
    pub backtest_log_return: f64,
    pub backtest_sharpe: f64,
}

impl RepetitionResult {
    pub fn summary(&self) -> RepetitionSummary {
        let last = self.convergence.last();
        RepetitionSummary {
            index: self.index,
            epochs: self.convergence.epochs().len(),
            final_average: last.map(|s| s.average).unwrap_or_default(),
            final_sharpe: last.map(|s| s.sharpe).unwrap_or_default(),
            backtest_steps: self.backtest.len(),
            backtest_log_return: self.backtest.cumulative_log_return(),
            backtest_sharpe: self.backtest.statistics().sharpe(),
        }
    }
}

/// Train for the configured epochs, then backtest on the data that follows
pub fn run_repetition(
    series: &ReturnSeries,
    settings: &ExperimentSettings,
    index: usize,
) -> Result<RepetitionResult> {
    let rl = &settings.rl;
    let seed = rl.learner.seed.wrapping_add(index as u64);

    let market = MarketEnvironment::new(series, settings.risk_free_rate, settings.window)?;
    let assets = market.assets().to_vec();
    let num_samples = market.num_samples();
    let task = AllocationTask::new(market, rl.costs.clone(), rl.task.clone(), seed)?;

    let controller =
        build_controller(rl.controller.kind, task.observation_size(), task.action_size())?;
    let learner = NpgpeLearner::new(
        controller,
        NpgpeConfig {
            seed,
            ..rl.learner.clone()
        },
    )?;
    let mut system = TradingSystem::new(learner, task, assets.clone())?
        .with_report_every(rl.experiment.report_every);

    let exp = &rl.experiment;
    let train_start = settings.window;
    let train_end = (train_start + exp.num_training_steps).min(num_samples);
    system
        .environment_mut()
        .set_evaluation_interval(train_start, train_end)?;

    info!(
        repetition = index,
        seed,
        train_start,
        train_end,
        epochs = exp.num_epochs,
        "Training started"
    );
    let mut convergence = ConvergenceReport::default();
    for _ in 0..exp.num_epochs {
        convergence.push(system.train_epoch(exp.num_training_steps)?);
    }

    let test_end = (train_end + exp.num_test_steps).min(num_samples);
    let backtest = if train_end < test_end {
        system
            .environment_mut()
            .set_evaluation_interval(train_end, test_end)?;
        system.backtest(exp.num_test_steps)?.clone()
    } else {
        warn!(
            repetition = index,
            train_end, num_samples, "No data left for the backtest"
        );
        BacktestReport::new(assets)
    };

    let snapshot = system.agent().snapshot();
    info!(
        repetition = index,
        backtest_steps = backtest.len(),
        log_return = backtest.cumulative_log_return(),
        "Repetition complete"
    );

    Ok(RepetitionResult {
        index,
        convergence,
        backtest,
        snapshot,
    })
}

/// Run every repetition concurrently; results are ordered by index
pub async fn run_experiments(
    series: Arc<ReturnSeries>,
    settings: Arc<ExperimentSettings>,
) -> Result<Vec<RepetitionResult>> {
    let mut tasks = JoinSet::new();
    for index in 0..settings.rl.experiment.num_experiments {
        let series = series.clone();
        let settings = settings.clone();
        tasks.spawn_blocking(move || run_repetition(&series, &settings, index));
    }

    let mut results = Vec::with_capacity(settings.rl.experiment.num_experiments);
    while let Some(joined) = tasks.join_next().await {
        let result = joined
            .map_err(|e| TradelabError::Internal(format!("repetition task failed: {e}")))??;
        results.push(result);
    }
    results.sort_by_key(|r| r.index);
    Ok(results)
}

/// Write per-repetition convergence, backtest and hyperparameter CSV files
pub fn write_results(dir: &Path, results: &[RepetitionResult]) -> Result<()> {
    std::fs::create_dir_all(dir)?;
    for result in results {
        let n = result.index;
        result
            .convergence
            .write_csv(dir.join(format!("convergence_{n}.csv")))?;
        result.backtest.write_csv(dir.join(format!("backtest_{n}.csv")))?;
        result
            .snapshot
            .write_csv(dir.join(format!("hyperparameters_{n}.csv")))?;
    }
    info!(dir = %dir.display(), repetitions = results.len(), "Results written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn settings() -> ExperimentSettings {
        let mut rl = RLConfig::default();
        rl.experiment.num_experiments = 2;
        rl.experiment.num_epochs = 3;
        rl.experiment.num_training_steps = 20;
        rl.experiment.num_test_steps = 10;
        rl.experiment.report_every = 0;
        ExperimentSettings {
            rl,
            risk_free_rate: 0.0001,
            window: 2,
        }
    }

    fn series(rows: usize) -> ReturnSeries {
        let returns = Array2::from_shape_fn((rows, 1), |(t, _)| 0.01 * (t as f64 * 1.3).cos());
        ReturnSeries::from_matrix(vec!["SPY".into()], returns).unwrap()
    }

    #[test]
    fn test_experiment_code() {
        let costs = CostConfig {
            delta_p: 0.0005,
            delta_f: 0.0,
            delta_s: 0.001,
            ..Default::default()
        };
        assert_eq!(
            experiment_code(1, LearnerKind::Npgpe, &costs, 10, ControllerKind::Softmax),
            "Single_RN_P5_F0_S10_N10_softmax"
        );
        assert_eq!(
            experiment_code(
                3,
                LearnerKind::RiskSensitive,
                &CostConfig::default(),
                0,
                ControllerKind::Discrete
            ),
            "Multi_RS_P0_F0_S0_N0_discrete"
        );
    }

    #[test]
    fn test_run_repetition() {
        let result = run_repetition(&series(40), &settings(), 0).unwrap();
        assert_eq!(result.convergence.epochs().len(), 3);
        assert_eq!(result.backtest.len(), 10);
        assert_eq!(result.backtest.rows()[0].time_index, 22);
        assert_eq!(result.summary().backtest_steps, 10);
    }

    #[test]
    fn test_short_series_skips_backtest() {
        let result = run_repetition(&series(15), &settings(), 0).unwrap();
        assert!(result.backtest.is_empty());
        assert_eq!(result.convergence.epochs().len(), 3);
    }

    #[tokio::test]
    async fn test_repetitions_are_independent_and_ordered() {
        let results = run_experiments(Arc::new(series(40)), Arc::new(settings()))
            .await
            .unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].index, 0);
        assert_eq!(results[1].index, 1);
        assert_ne!(results[0].snapshot, results[1].snapshot);

        // same seed, same outcome
        let again = run_repetition(&series(40), &settings(), 1).unwrap();
        assert_eq!(again.snapshot, results[1].snapshot);
    }

    #[test]
    fn test_write_results() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_repetition(&series(40), &settings(), 0).unwrap();
        write_results(dir.path(), &[result]).unwrap();

        for file in ["convergence_0.csv", "backtest_0.csv", "hyperparameters_0.csv"] {
            assert!(dir.path().join(file).exists(), "{file} missing");
        }
    }
}
