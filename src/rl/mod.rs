//! Reinforcement Learning Module
//!
//! Parameter-exploring policy gradient learning for asset allocation under
//! transaction costs.
//!
//! # Features
//!
//! - **Performance**: Portfolio returns net of proportional, fixed and short-selling costs
//! - **Controllers**: Softmax (long-only) and discrete (short/neutral/long) policies
//! - **Algorithms**: NPGPE (natural policy gradient with parameter-based exploration)
//! - **Environment**: Return-series replay with a risk-free asset and an allocation task
//! - **Training**: Epoch training, backtesting, reports and concurrent repetitions

pub mod algorithms;
pub mod config;
pub mod core;
pub mod environment;
pub mod training;

// Config exports
pub use self::config::{
    ControllerConfig, ControllerKind, CostConfig, ExperimentConfig, FixedCostTrigger,
    LearnerKind, NpgpeConfig, RLConfig, TaskConfig, TaskMode,
};

// Core exports
pub use self::core::{
    build_controller, log_return, portfolio_breakdown, portfolio_log_return, portfolio_return,
    Agent, Controller, DiscreteController, Environment, ExponentialMovingAverage, LearningRate,
    ReturnBreakdown, SoftmaxController, StepOutcome,
};

// Algorithm exports
pub use algorithms::{LearnerPhase, NpgpeLearner, NpgpeSnapshot};

// Environment exports
pub use environment::{
    prices_to_returns, random_simplex_point, risk_free_allocation, AllocationTask,
    CointegratedGenerator, MarketEnvironment, PriceGenerator, ReturnSeries, RISK_FREE_ASSET,
};

// Training exports
pub use training::{
    experiment_code, run_experiments, run_repetition, write_results, BacktestReport,
    BacktestRow, ConvergenceReport, EpochStats, ExperimentSettings,
    RepetitionResult, RepetitionSummary, RunningStatistics, TradingSystem,
};
