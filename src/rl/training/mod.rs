//! Training Infrastructure
//!
//! The driving loop, reward statistics, reports and the experiment runner.

pub mod experiment;
pub mod report;
pub mod statistics;
pub mod trading_system;

pub use experiment::{
    experiment_code, run_experiments, run_repetition, write_results, ExperimentSettings,
    RepetitionResult, RepetitionSummary,
};
pub use report::{BacktestReport, BacktestRow, ConvergenceReport, EpochStats};
pub use statistics::RunningStatistics;
pub use trading_system::TradingSystem;
