//! Asset Allocation Task
//!
//! Turns the market into an RL task. The agent observes the recent asset
//! returns augmented with the allocation it currently holds, picks a new
//! allocation, and is rewarded with the portfolio log-return net of
//! transaction costs.

use ndarray::{concatenate, Array1, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Exp1};
use tracing::trace;

use crate::error::{Result, TradelabError};
use crate::rl::config::{CostConfig, TaskConfig, TaskMode};
use crate::rl::core::{portfolio_breakdown, Environment, StepOutcome};
use crate::rl::environment::market::MarketEnvironment;

#[derive(Debug)]
pub struct AllocationTask {
    market: MarketEnvironment,
    costs: CostConfig,
    config: TaskConfig,
    allocation: Array1<f64>,
    pending: Option<Array1<f64>>,
    episode_step: usize,
    rng: StdRng,
}

impl AllocationTask {
    /// `seed` drives random episode restarts only
    pub fn new(
        market: MarketEnvironment,
        costs: CostConfig,
        config: TaskConfig,
        seed: u64,
    ) -> Result<Self> {
        if config.mode == TaskMode::Episodic && config.horizon == 0 {
            return Err(TradelabError::Validation(
                "episodic task needs a positive horizon".to_string(),
            ));
        }
        let allocation = risk_free_allocation(market.num_assets());
        Ok(Self {
            market,
            costs,
            config,
            allocation,
            pending: None,
            episode_step: 0,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    pub fn market(&self) -> &MarketEnvironment {
        &self.market
    }

    pub fn market_mut(&mut self) -> &mut MarketEnvironment {
        &mut self.market
    }

    pub fn costs(&self) -> &CostConfig {
        &self.costs
    }

    /// Allocation currently held, after drift
    pub fn allocation(&self) -> &Array1<f64> {
        &self.allocation
    }

    pub fn episode_step(&self) -> usize {
        self.episode_step
    }

    /// Restrict the market to `[start, end)` and rewind
    pub fn set_evaluation_interval(&mut self, start: usize, end: usize) -> Result<()> {
        self.market.set_evaluation_interval(start, end)?;
        self.reset()
    }

    fn initial_allocation(&mut self) -> Array1<f64> {
        let n = self.market.num_assets();
        if self.config.random_reset {
            random_simplex_point(n, &mut self.rng)
        } else {
            risk_free_allocation(n)
        }
    }

    /// Drifted weights `new * (1 + r) / (1 + r_ptf)`
    fn drift(
        &self,
        allocation: &Array1<f64>,
        asset_returns: ArrayView1<'_, f64>,
        ptf: f64,
    ) -> Array1<f64> {
        let mut drifted = allocation * &asset_returns.mapv(|r| 1.0 + r) / (1.0 + ptf);
        if self.config.renormalize_allocation {
            let total = drifted.sum();
            if total.is_finite() && total.abs() > f64::EPSILON {
                drifted /= total;
            }
        }
        drifted
    }
}

impl Environment for AllocationTask {
    fn observation_size(&self) -> usize {
        self.market.observation_size() + self.market.num_assets()
    }

    fn action_size(&self) -> usize {
        self.market.num_assets()
    }

    fn observe(&self) -> Result<Array1<f64>> {
        let past = self.market.past_returns();
        concatenate(Axis(0), &[past.view(), self.allocation.view()])
            .map_err(|e| TradelabError::Internal(format!("observation assembly failed: {e}")))
    }

    fn perform_action(&mut self, action: ArrayView1<'_, f64>) -> Result<()> {
        if self.pending.is_some() {
            return Err(TradelabError::transition("ActionPending", "ActionPending"));
        }
        TradelabError::check_len("action", self.action_size(), action.len())?;
        if action.iter().any(|w| !w.is_finite()) {
            return Err(TradelabError::Numerical(format!(
                "allocation is not finite: {action}"
            )));
        }
        self.pending = Some(action.to_owned());
        Ok(())
    }

    fn reward(&mut self) -> Result<StepOutcome> {
        let Some(allocation) = self.pending.take() else {
            return Err(TradelabError::transition("Observing", "Rewarded"));
        };

        let time_index = self.market.current_index();
        let date = self.market.current_date().unwrap_or_default().to_string();
        let asset_returns = self.market.asset_returns()?.to_owned();

        let breakdown = portfolio_breakdown(
            asset_returns.view(),
            self.allocation.view(),
            allocation.view(),
            &self.costs,
        )?;
        let log_return = breakdown.log_return()?;

        self.allocation = self.drift(&allocation, asset_returns.view(), breakdown.simple_return);
        self.market.advance();
        self.episode_step += 1;

        trace!(
            t = time_index,
            simple_return = breakdown.simple_return,
            turnover = breakdown.turnover,
            "Allocation evaluated"
        );

        Ok(StepOutcome {
            time_index,
            date,
            asset_returns,
            allocation,
            breakdown,
            log_return,
        })
    }

    fn is_finished(&self) -> bool {
        match self.config.mode {
            TaskMode::Continuous => self.market.is_exhausted(),
            TaskMode::Episodic => {
                self.episode_step >= self.config.horizon || self.market.is_exhausted()
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.market.is_exhausted()
    }

    fn begin_episode(&mut self) {
        self.allocation = self.initial_allocation();
        self.pending = None;
        self.episode_step = 0;
    }

    fn reset(&mut self) -> Result<()> {
        self.market.reset();
        self.begin_episode();
        Ok(())
    }
}

/// Everything in the risk-free asset
pub fn risk_free_allocation(num_assets: usize) -> Array1<f64> {
    let mut allocation = Array1::zeros(num_assets);
    if num_assets > 0 {
        allocation[0] = 1.0;
    }
    allocation
}

/// Uniform draw from the probability simplex
pub fn random_simplex_point<R: rand::Rng + ?Sized>(num_assets: usize, rng: &mut R) -> Array1<f64> {
    let draws: Array1<f64> = (0..num_assets)
        .map(|_| -> f64 { Exp1.sample(&mut *rng) })
        .collect();
    let total = draws.sum();
    if total > 0.0 {
        draws / total
    } else {
        risk_free_allocation(num_assets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::environment::series::ReturnSeries;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    fn task(config: TaskConfig, costs: CostConfig) -> AllocationTask {
        let series = ReturnSeries::from_matrix(
            vec!["A".into()],
            array![[0.10], [0.20], [-0.10], [0.05], [0.0]],
        )
        .unwrap();
        let market = MarketEnvironment::new(&series, 0.0, 1).unwrap();
        AllocationTask::new(market, costs, config, 1).unwrap()
    }

    #[test]
    fn test_observation_layout() {
        let task = task(TaskConfig::default(), CostConfig::default());
        assert_eq!(task.observation_size(), 4);
        assert_eq!(task.observe().unwrap(), array![0.0, 0.10, 1.0, 0.0]);
    }

    #[test]
    fn test_reward_and_drift() {
        let mut task = task(
            TaskConfig {
                renormalize_allocation: false,
                ..Default::default()
            },
            CostConfig::default(),
        );
        task.perform_action(array![0.5, 0.5].view()).unwrap();
        let outcome = task.reward().unwrap();

        assert_eq!(outcome.time_index, 1);
        assert_abs_diff_eq!(outcome.breakdown.simple_return, 0.1, epsilon = 1e-15);
        assert_abs_diff_eq!(outcome.log_return, 1.1_f64.ln(), epsilon = 1e-15);
        assert_abs_diff_eq!(task.allocation()[0], 0.5 / 1.1, epsilon = 1e-15);
        assert_abs_diff_eq!(task.allocation()[1], 0.6 / 1.1, epsilon = 1e-15);
        assert_eq!(task.market().current_index(), 2);
    }

    #[test]
    fn test_renormalized_drift_sums_to_one() {
        let costs = CostConfig {
            delta_p: 0.01,
            delta_f: 0.001,
            ..Default::default()
        };
        let mut task = task(TaskConfig::default(), costs);
        task.perform_action(array![0.3, 0.7].view()).unwrap();
        task.reward().unwrap();
        assert_abs_diff_eq!(task.allocation().sum(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reward_requires_action() {
        let mut task = task(TaskConfig::default(), CostConfig::default());
        assert!(matches!(
            task.reward(),
            Err(TradelabError::InvalidStateTransition { .. })
        ));
        task.perform_action(array![1.0, 0.0].view()).unwrap();
        assert!(task.perform_action(array![1.0, 0.0].view()).is_err());
        assert!(task.perform_action(array![1.0].view()).is_err());
    }

    #[test]
    fn test_wipeout_is_a_domain_error() {
        let series = ReturnSeries::from_matrix(vec!["A".into()], array![[0.0], [-0.6]]).unwrap();
        let market = MarketEnvironment::new(&series, 0.0, 1).unwrap();
        let mut task =
            AllocationTask::new(market, CostConfig::default(), TaskConfig::default(), 0).unwrap();
        task.perform_action(array![-1.0, 2.0].view()).unwrap();
        assert!(matches!(task.reward(), Err(TradelabError::Domain(_))));
    }

    #[test]
    fn test_episodic_horizon() {
        let mut task = task(
            TaskConfig {
                mode: TaskMode::Episodic,
                horizon: 2,
                ..Default::default()
            },
            CostConfig::default(),
        );
        for _ in 0..2 {
            assert!(!task.is_finished());
            task.perform_action(array![0.0, 1.0].view()).unwrap();
            task.reward().unwrap();
        }
        assert!(task.is_finished());
        assert!(!task.is_exhausted());

        task.begin_episode();
        assert!(!task.is_finished());
        assert_eq!(task.allocation(), &array![1.0, 0.0]);
        assert_eq!(task.market().current_index(), 3);
    }

    #[test]
    fn test_continuous_runs_until_exhausted() {
        let mut task = task(TaskConfig::default(), CostConfig::default());
        let mut steps = 0;
        while !task.is_finished() {
            task.perform_action(array![1.0, 0.0].view()).unwrap();
            task.reward().unwrap();
            steps += 1;
        }
        assert_eq!(steps, 4);

        task.reset().unwrap();
        assert_eq!(task.market().current_index(), 1);
        assert_eq!(task.allocation(), &array![1.0, 0.0]);
    }

    #[test]
    fn test_random_reset_is_on_simplex() {
        let mut task = task(
            TaskConfig {
                random_reset: true,
                ..Default::default()
            },
            CostConfig::default(),
        );
        task.reset().unwrap();
        let allocation = task.allocation();
        assert_abs_diff_eq!(allocation.sum(), 1.0, epsilon = 1e-12);
        assert!(allocation.iter().all(|&w| w >= 0.0));
    }
}
