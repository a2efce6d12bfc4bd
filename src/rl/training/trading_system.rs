//! Trading System
//!
//! Drives an agent through an environment one Draw -> Act -> Evaluate ->
//! Learn cycle at a time. Training and backtesting share the same loop and
//! differ only in whether the agent is allowed to learn.

use ndarray::ArrayView1;
use tracing::{debug, info, warn};

use crate::error::{Result, TradelabError};
use crate::rl::core::{Agent, Environment, StepOutcome};
use crate::rl::training::report::{BacktestReport, BacktestRow, EpochStats};
use crate::rl::training::statistics::RunningStatistics;

pub struct TradingSystem<A: Agent, E: Environment> {
    agent: A,
    environment: E,
    assets: Vec<String>,
    stats: RunningStatistics,
    report: Option<BacktestReport>,
    report_every: usize,
    epoch: usize,
}

impl<A: Agent, E: Environment> TradingSystem<A, E> {
    /// `assets` names the action components, in order, for reports
    pub fn new(agent: A, environment: E, assets: Vec<String>) -> Result<Self> {
        TradelabError::check_len("asset names", environment.action_size(), assets.len())?;
        Ok(Self {
            agent,
            environment,
            assets,
            stats: RunningStatistics::new(),
            report: None,
            report_every: 0,
            epoch: 0,
        })
    }

    /// Log running statistics every `n` steps (0 disables)
    pub fn with_report_every(mut self, n: usize) -> Self {
        self.report_every = n;
        self
    }

    pub fn agent(&self) -> &A {
        &self.agent
    }

    pub fn environment(&self) -> &E {
        &self.environment
    }

    pub fn environment_mut(&mut self) -> &mut E {
        &mut self.environment
    }

    /// Reward statistics since the last epoch or backtest started
    pub fn statistics(&self) -> &RunningStatistics {
        &self.stats
    }

    pub fn report(&self) -> Option<&BacktestReport> {
        self.report.as_ref()
    }

    pub fn into_parts(self) -> (A, E, Option<BacktestReport>) {
        (self.agent, self.environment, self.report)
    }

    /// One full interaction cycle
    pub fn step(&mut self) -> Result<StepOutcome> {
        if self.environment.is_exhausted() {
            return Err(TradelabError::InvalidState(
                "no market data left in the evaluation interval".to_string(),
            ));
        }
        if self.environment.is_finished() {
            self.environment.begin_episode();
        }

        let observation = self.environment.observe()?;
        let action = self.agent.act(observation.view())?;
        let outcome = match self.settle(action.view()) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Step aborted, discarding pending decision");
                self.agent.discard();
                return Err(e);
            }
        };

        self.stats.push(outcome.log_return);
        if let Some(report) = self.report.as_mut() {
            report.push(BacktestRow::from(&outcome))?;
        }
        Ok(outcome)
    }

    /// Evaluate an emitted action and close the agent's cycle
    fn settle(&mut self, action: ArrayView1<'_, f64>) -> Result<StepOutcome> {
        self.environment.perform_action(action)?;
        let outcome = self.environment.reward()?;
        self.agent.give_reward(outcome.log_return)?;
        self.agent.learn()?;
        Ok(outcome)
    }

    /// Run up to `steps` cycles, stopping early when data runs out
    fn run(&mut self, steps: usize) -> Result<usize> {
        let mut done = 0;
        while done < steps && !self.environment.is_exhausted() {
            self.step()?;
            done += 1;
            if self.report_every > 0 && done % self.report_every == 0 {
                debug!(
                    epoch = self.epoch,
                    step = done,
                    average = self.stats.mean(),
                    stdev = self.stats.stdev(),
                    "Running reward"
                );
            }
        }
        Ok(done)
    }

    /// One training epoch over the current evaluation interval
    pub fn train_epoch(&mut self, steps: usize) -> Result<EpochStats> {
        self.agent.set_learning(true);
        self.environment.reset()?;
        self.stats.reset();
        self.report = None;

        let done = self.run(steps)?;
        let stats = EpochStats::from_statistics(self.epoch, &self.stats);
        info!(
            epoch = self.epoch,
            steps = done,
            average = stats.average,
            stdev = stats.stdev,
            sharpe = stats.sharpe,
            "Epoch complete"
        );

        self.agent.new_epoch();
        self.epoch += 1;
        Ok(stats)
    }

    /// Trade without learning over the current evaluation interval
    pub fn backtest(&mut self, steps: usize) -> Result<&BacktestReport> {
        self.agent.set_learning(false);
        self.environment.reset()?;
        self.stats.reset();
        self.report = Some(BacktestReport::new(self.assets.clone()));

        let done = self.run(steps)?;
        info!(
            steps = done,
            average = self.stats.mean(),
            sharpe = self.stats.sharpe(),
            "Backtest complete"
        );

        self.report
            .as_ref()
            .ok_or_else(|| TradelabError::Internal("backtest report missing".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rl::algorithms::{LearnerPhase, NpgpeLearner};
    use crate::rl::config::{CostConfig, NpgpeConfig, TaskConfig, TaskMode};
    use crate::rl::core::SoftmaxController;
    use crate::rl::environment::{AllocationTask, MarketEnvironment, ReturnSeries};
    use approx::assert_abs_diff_eq;
    use ndarray::{array, Array1, Array2};

    fn system(task: TaskConfig) -> TradingSystem<NpgpeLearner, AllocationTask> {
        let returns = Array2::from_shape_fn((30, 2), |(t, j)| {
            0.01 * ((t * (j + 1)) as f64 * 0.7).sin()
        });
        let series = ReturnSeries::from_matrix(vec!["A".into(), "B".into()], returns).unwrap();
        let market = MarketEnvironment::new(&series, 0.0001, 2).unwrap();
        let assets = market.assets().to_vec();
        let task = AllocationTask::new(market, CostConfig::default(), task, 0).unwrap();

        let controller =
            SoftmaxController::new(task.observation_size(), task.action_size()).unwrap();
        let learner = NpgpeLearner::new(Box::new(controller), NpgpeConfig::default()).unwrap();
        TradingSystem::new(learner, task, assets).unwrap()
    }

    #[test]
    fn test_training_epoch_statistics() {
        let mut system = system(TaskConfig::default());
        let stats = system.train_epoch(10).unwrap();
        assert_eq!(stats.epoch, 0);
        assert_eq!(system.statistics().count(), 10);
        assert!(system.report().is_none());
        assert!(system.agent().baseline().is_some());

        let stats = system.train_epoch(1000).unwrap();
        assert_eq!(stats.epoch, 1);
        assert_eq!(system.statistics().count(), 28);
    }

    #[test]
    fn test_backtest_freezes_agent() {
        let mut system = system(TaskConfig::default());
        system.train_epoch(20).unwrap();
        let before = system.agent().snapshot();

        let report = system.backtest(15).unwrap();
        assert_eq!(report.len(), 15);
        let sum: f64 = report.rows().iter().map(|r| r.log_return).sum();
        assert_abs_diff_eq!(report.cumulative_log_return(), sum);
        assert_eq!(system.agent().snapshot(), before);
    }

    #[test]
    fn test_episodic_restarts() {
        let mut system = system(TaskConfig {
            mode: TaskMode::Episodic,
            horizon: 3,
            ..Default::default()
        });
        for _ in 0..7 {
            system.step().unwrap();
        }
        assert_eq!(system.environment().episode_step(), 1);
    }

    #[test]
    fn test_domain_error_leaves_agent_ready() {
        // trading starts at row 1; row 2 wipes out more than the risky position
        let returns = array![[0.0], [0.0], [-1.5], [0.01], [0.01]];
        let series = ReturnSeries::from_matrix(vec!["R".into()], returns).unwrap();
        let market = MarketEnvironment::new(&series, 0.0, 1).unwrap();
        let assets = market.assets().to_vec();
        let task =
            AllocationTask::new(market, CostConfig::default(), TaskConfig::default(), 0).unwrap();

        // bias of the risky row pushes the whole allocation into the risky asset
        let controller =
            SoftmaxController::new(task.observation_size(), task.action_size()).unwrap();
        let mut learner = NpgpeLearner::new(Box::new(controller), NpgpeConfig::default()).unwrap();
        let n = learner.num_parameters();
        let mut mu = Array1::zeros(n);
        mu[n - 1] = 50.0;
        learner.set_hyperparameters(mu, Array2::eye(n) * 1e-6).unwrap();
        let mut system = TradingSystem::new(learner, task, assets).unwrap();

        system.step().unwrap();
        for _ in 0..2 {
            assert!(matches!(system.step(), Err(TradelabError::Domain(_))));
            assert_eq!(system.agent().phase(), LearnerPhase::Ready);
        }
        assert_eq!(system.statistics().count(), 1);
    }

    #[test]
    fn test_step_after_exhaustion_fails() {
        let mut system = system(TaskConfig::default());
        system.train_epoch(100).unwrap();
        assert!(matches!(system.step(), Err(TradelabError::InvalidState(_))));
    }
}
