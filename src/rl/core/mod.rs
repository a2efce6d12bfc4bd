//! Core RL abstractions
//!
//! Agent/environment interfaces, performance measures, estimators and
//! controllers shared by the learner and the market task.

pub mod controller;
pub mod ema;
pub mod learning_rate;
pub mod performance;
pub mod traits;

pub use controller::{build_controller, Controller, DiscreteController, SoftmaxController};
pub use ema::ExponentialMovingAverage;
pub use learning_rate::LearningRate;
pub use performance::{
    log_return, portfolio_breakdown, portfolio_log_return, portfolio_return, ReturnBreakdown,
};
pub use traits::{Agent, Environment, StepOutcome};
