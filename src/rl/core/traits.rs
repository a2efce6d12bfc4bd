//! Agent and Environment Interfaces
//!
//! Small capability traits composed by the trading system's driving loop.

use ndarray::{Array1, ArrayView1};

use crate::error::Result;
use crate::rl::core::performance::ReturnBreakdown;

/// Learning agent following the Draw -> Act -> Evaluate -> Learn cycle
pub trait Agent: Send {
    /// Select an action for the observation
    fn act(&mut self, observation: ArrayView1<'_, f64>) -> Result<Array1<f64>>;

    /// Store the reward earned by the last action
    fn give_reward(&mut self, reward: f64) -> Result<()>;

    /// Close the cycle, updating the policy when learning is enabled
    fn learn(&mut self) -> Result<()>;

    /// Drop a half-finished decision and return to waiting for an observation
    fn discard(&mut self);

    /// Toggle between learning and backtest mode
    fn set_learning(&mut self, learning: bool);

    fn is_learning(&self) -> bool;

    /// Advance per-epoch schedules
    fn new_epoch(&mut self);

    /// Forget everything learned so far
    fn reset(&mut self);
}

/// Result of evaluating one action
#[derive(Debug, Clone)]
pub struct StepOutcome {
    /// Time index the action was evaluated at
    pub time_index: usize,
    /// Date label of that time index
    pub date: String,
    /// Realized asset returns of the period
    pub asset_returns: Array1<f64>,
    /// Allocation chosen for the period
    pub allocation: Array1<f64>,
    /// Cost breakdown of the rebalancing
    pub breakdown: ReturnBreakdown,
    /// Net log-return, the reward handed to the agent
    pub log_return: f64,
}

/// Task seen by an agent
pub trait Environment: Send {
    /// Length of the observation vector
    fn observation_size(&self) -> usize;

    /// Length of the action vector
    fn action_size(&self) -> usize;

    /// Current observation
    fn observe(&self) -> Result<Array1<f64>>;

    /// Cache the action to be evaluated by the next `reward` call
    fn perform_action(&mut self, action: ArrayView1<'_, f64>) -> Result<()>;

    /// Evaluate the cached action and advance time
    fn reward(&mut self) -> Result<StepOutcome>;

    /// Whether the current episode is over
    fn is_finished(&self) -> bool;

    /// Whether the evaluation interval has no data left
    fn is_exhausted(&self) -> bool;

    /// Start a new episode without rewinding time
    fn begin_episode(&mut self);

    /// Rewind to the start of the evaluation interval
    fn reset(&mut self) -> Result<()>;
}
