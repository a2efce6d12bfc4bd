//! Natural Policy Gradient with Parameter-based Exploration (NPGPE)
//!
//! Controller parameters are drawn from `N(mu, CᵀC)` with `C` upper
//! triangular. After each reward the learner folds the natural gradient of
//! the log-likelihood into decayed traces and moves `mu` and `C` along them,
//! scaled by the reward advantage over an exponential baseline.
//!
//! The risk-sensitive variant keeps a second baseline on the squared reward
//! and scales the same traces by the gradient of the Sharpe ratio
//! `E[r] / sqrt(E[r²] - E[r]²)` instead.
//!
//! Each decision follows the cycle `act -> give_reward -> learn`; any other
//! order is rejected with `InvalidStateTransition`.

use std::fmt;
use std::path::Path;

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use tracing::{debug, warn};

use crate::error::{Result, TradelabError};
use crate::rl::config::{LearnerKind, NpgpeConfig};
use crate::rl::core::{Agent, Controller, ExponentialMovingAverage, LearningRate};

/// Position of the learner in its decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LearnerPhase {
    /// Waiting for an observation
    Ready,
    /// Parameters drawn and action emitted, waiting for the reward
    Acted,
    /// Reward stored, waiting for `learn`
    Rewarded,
}

impl fmt::Display for LearnerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => write!(f, "Ready"),
            Self::Acted => write!(f, "Acted"),
            Self::Rewarded => write!(f, "Rewarded"),
        }
    }
}

/// Hyperparameters of the search distribution
#[derive(Debug, Clone, PartialEq)]
pub struct NpgpeSnapshot {
    pub mu: Array1<f64>,
    pub cholesky: Array2<f64>,
    pub baseline: Option<f64>,
}

impl NpgpeSnapshot {
    /// One row per parameter: `index,mu,c_0,...,c_{n-1}`
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        let mut header = vec!["index".to_string(), "mu".to_string()];
        header.extend((0..self.cholesky.ncols()).map(|j| format!("c_{j}")));
        writer.write_record(&header)?;
        for (i, (mu, row)) in self.mu.iter().zip(self.cholesky.rows()).enumerate() {
            let mut record = vec![i.to_string(), mu.to_string()];
            record.extend(row.iter().map(|c| c.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Standard-normal draw and the parameters derived from it
#[derive(Debug, Clone)]
struct Draw {
    noise: Array1<f64>,
    theta: Array1<f64>,
}

/// NPGPE learner owning its controller
#[derive(Debug)]
pub struct NpgpeLearner {
    config: NpgpeConfig,
    controller: Box<dyn Controller>,
    mu: Array1<f64>,
    cholesky: Array2<f64>,
    gradient_mu: Array1<f64>,
    gradient_cholesky: Array2<f64>,
    baseline: ExponentialMovingAverage,
    square_baseline: ExponentialMovingAverage,
    alpha_mu: LearningRate,
    alpha_c: LearningRate,
    rng: StdRng,
    phase: LearnerPhase,
    draw: Option<Draw>,
    reward: Option<f64>,
    learning: bool,
}

impl NpgpeLearner {
    pub fn new(controller: Box<dyn Controller>, config: NpgpeConfig) -> Result<Self> {
        if !(config.epsilon > 0.0) {
            return Err(TradelabError::Validation(format!(
                "epsilon must be positive, got {}",
                config.epsilon
            )));
        }
        let n = controller.num_parameters();
        Ok(Self {
            mu: Array1::zeros(n),
            cholesky: Array2::eye(n) * config.epsilon,
            gradient_mu: Array1::zeros(n),
            gradient_cholesky: Array2::zeros((n, n)),
            baseline: ExponentialMovingAverage::constant(config.baseline_rate),
            square_baseline: ExponentialMovingAverage::constant(config.baseline_rate),
            alpha_mu: LearningRate::new(config.alpha_mu, config.alpha_exp),
            alpha_c: LearningRate::new(config.alpha_c, config.alpha_exp),
            rng: StdRng::seed_from_u64(config.seed),
            phase: LearnerPhase::Ready,
            draw: None,
            reward: None,
            learning: true,
            controller,
            config,
        })
    }

    pub fn config(&self) -> &NpgpeConfig {
        &self.config
    }

    pub fn controller(&self) -> &dyn Controller {
        self.controller.as_ref()
    }

    pub fn num_parameters(&self) -> usize {
        self.mu.len()
    }

    pub fn phase(&self) -> LearnerPhase {
        self.phase
    }

    pub fn mu(&self) -> &Array1<f64> {
        &self.mu
    }

    /// Upper-triangular factor `C` of the sampling covariance
    pub fn cholesky(&self) -> &Array2<f64> {
        &self.cholesky
    }

    /// Sampling covariance `CᵀC`
    pub fn covariance(&self) -> Array2<f64> {
        self.cholesky.t().dot(&self.cholesky)
    }

    pub fn gradient_mu(&self) -> &Array1<f64> {
        &self.gradient_mu
    }

    pub fn gradient_cholesky(&self) -> &Array2<f64> {
        &self.gradient_cholesky
    }

    pub fn baseline(&self) -> Option<f64> {
        self.baseline.value()
    }

    /// Baseline of the squared reward, tracked by the risk-sensitive variant
    pub fn square_baseline(&self) -> Option<f64> {
        self.square_baseline.value()
    }

    /// Learning rates `(alpha_mu, alpha_c)` of the current epoch
    pub fn learning_rates(&self) -> (f64, f64) {
        (self.alpha_mu.get(), self.alpha_c.get())
    }

    pub fn snapshot(&self) -> NpgpeSnapshot {
        NpgpeSnapshot {
            mu: self.mu.clone(),
            cholesky: self.cholesky.clone(),
            baseline: self.baseline.value(),
        }
    }

    /// Install hyperparameters directly. Traces are cleared.
    #[cfg(test)]
    pub(crate) fn set_hyperparameters(
        &mut self,
        mu: Array1<f64>,
        cholesky: Array2<f64>,
    ) -> Result<()> {
        let n = self.num_parameters();
        TradelabError::check_len("mean vector", n, mu.len())?;
        TradelabError::check_len("cholesky rows", n, cholesky.nrows())?;
        TradelabError::check_len("cholesky columns", n, cholesky.ncols())?;
        self.mu = mu;
        self.cholesky = cholesky;
        self.gradient_mu.fill(0.0);
        self.gradient_cholesky.fill(0.0);
        Ok(())
    }

    /// Act with a caller-supplied standard-normal draw instead of sampling one
    pub fn act_with_noise(
        &mut self,
        observation: ArrayView1<'_, f64>,
        noise: Array1<f64>,
    ) -> Result<Array1<f64>> {
        if self.phase != LearnerPhase::Ready {
            return Err(TradelabError::transition(self.phase, LearnerPhase::Acted));
        }
        TradelabError::check_len("noise", self.num_parameters(), noise.len())?;
        self.check_distribution()?;

        let theta = &self.mu + &self.cholesky.t().dot(&noise);
        self.controller.set_parameters(theta.view())?;
        let action = self.controller.activate(observation)?;

        self.draw = Some(Draw { noise, theta });
        self.reward = None;
        self.phase = LearnerPhase::Acted;
        Ok(action)
    }

    /// Fail when the search distribution can no longer be sampled
    fn check_distribution(&self) -> Result<()> {
        if self.mu.iter().any(|v| !v.is_finite()) {
            return Err(TradelabError::Numerical("mean vector is not finite".to_string()));
        }
        if self.cholesky.iter().any(|v| !v.is_finite()) {
            return Err(TradelabError::Numerical(
                "cholesky factor is not finite".to_string(),
            ));
        }
        if let Some((i, d)) = self
            .cholesky
            .diag()
            .iter()
            .enumerate()
            .find(|(_, d)| d.abs() < self.config.min_cholesky_diag)
        {
            return Err(TradelabError::Numerical(format!(
                "cholesky factor is singular: diagonal entry {i} is {d}"
            )));
        }
        Ok(())
    }

    /// Natural gradient of the log-likelihood for the cached draw
    fn natural_gradient(&self, draw: &Draw) -> (Array1<f64>, Array2<f64>) {
        let gradient_mu = &draw.theta - &self.mu;

        // triu(x xᵀ) - diag(x xᵀ)/2 - I/2
        let n = draw.noise.len();
        let column = draw.noise.view().insert_axis(Axis(1));
        let outer = column.dot(&column.t());
        let mut factor = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                factor[[i, j]] = outer[[i, j]];
            }
            factor[[i, i]] -= 0.5 * outer[[i, i]] + 0.5;
        }

        (gradient_mu, factor.dot(&self.cholesky))
    }

    /// Scale of the update: reward advantage, or Sharpe-ratio gradient
    /// weight for the risk-sensitive variant. `None` skips the step.
    fn update_scale(&mut self, reward: f64) -> Result<Option<f64>> {
        self.baseline.update(reward);
        let mean = self.baseline.get()?;
        if self.config.kind == LearnerKind::Npgpe {
            return Ok(Some(reward - mean));
        }

        self.square_baseline.update(reward * reward);
        let second = self.square_baseline.get()?;
        let variance = second - mean * mean;
        if !(variance > self.config.min_variance) {
            debug!(variance, "reward variance below threshold, skipping update");
            return Ok(None);
        }
        // (E[r²] ∇E[r] - E[r] ∇E[r²] / 2) / σ³
        let scale = (second * (reward - mean) - 0.5 * mean * (reward * reward - second))
            / (variance * variance.sqrt());
        Ok(Some(scale))
    }

    /// Flip rows with a negative diagonal; `CᵀC` is unchanged
    fn canonicalize_cholesky(&mut self) {
        for i in 0..self.cholesky.nrows() {
            if self.cholesky[[i, i]] < 0.0 {
                warn!(
                    row = i,
                    diagonal = self.cholesky[[i, i]],
                    "Cholesky factor has negative diagonal, flipping row"
                );
                self.cholesky.row_mut(i).mapv_inplace(|v| -v);
            }
        }
    }
}

impl Agent for NpgpeLearner {
    fn act(&mut self, observation: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        if self.phase != LearnerPhase::Ready {
            return Err(TradelabError::transition(self.phase, LearnerPhase::Acted));
        }
        let n = self.num_parameters();
        let rng = &mut self.rng;
        let noise: Array1<f64> = (0..n)
            .map(|_| -> f64 { StandardNormal.sample(&mut *rng) })
            .collect();
        self.act_with_noise(observation, noise)
    }

    fn give_reward(&mut self, reward: f64) -> Result<()> {
        if self.phase != LearnerPhase::Acted {
            return Err(TradelabError::transition(self.phase, LearnerPhase::Rewarded));
        }
        self.reward = Some(reward);
        self.phase = LearnerPhase::Rewarded;
        Ok(())
    }

    fn learn(&mut self) -> Result<()> {
        if self.phase != LearnerPhase::Rewarded {
            return Err(TradelabError::transition(self.phase, LearnerPhase::Ready));
        }
        let (Some(draw), Some(reward)) = (self.draw.take(), self.reward.take()) else {
            return Err(TradelabError::InvalidState(
                "rewarded learner has no cached draw".to_string(),
            ));
        };
        self.phase = LearnerPhase::Ready;

        if !self.learning {
            return Ok(());
        }

        let scale = self.update_scale(reward)?;

        let (new_gradient_mu, new_gradient_cholesky) = self.natural_gradient(&draw);
        let gamma = self.config.gamma;
        self.gradient_mu = &self.gradient_mu * gamma + &new_gradient_mu;
        self.gradient_cholesky = &self.gradient_cholesky * gamma + &new_gradient_cholesky;

        let Some(scale) = scale else {
            return Ok(());
        };
        let step_mu = self.alpha_mu.get() * scale;
        let step_c = self.alpha_c.get() * scale;
        self.mu.scaled_add(step_mu, &self.gradient_mu);
        self.cholesky.scaled_add(step_c, &self.gradient_cholesky);

        self.canonicalize_cholesky();
        Ok(())
    }

    fn discard(&mut self) {
        if self.phase != LearnerPhase::Ready {
            debug!(phase = %self.phase, "discarding pending decision");
        }
        self.phase = LearnerPhase::Ready;
        self.draw = None;
        self.reward = None;
    }

    fn set_learning(&mut self, learning: bool) {
        self.learning = learning;
    }

    fn is_learning(&self) -> bool {
        self.learning
    }

    fn new_epoch(&mut self) {
        self.alpha_mu.advance();
        self.alpha_c.advance();
        debug!(
            epoch = self.alpha_mu.epoch(),
            alpha_mu = self.alpha_mu.get(),
            alpha_c = self.alpha_c.get(),
            "NPGPE learning rates advanced"
        );
    }

    fn reset(&mut self) {
        let n = self.num_parameters();
        self.mu = Array1::zeros(n);
        self.cholesky = Array2::eye(n) * self.config.epsilon;
        self.gradient_mu = Array1::zeros(n);
        self.gradient_cholesky = Array2::zeros((n, n));
        self.baseline.reset();
        self.square_baseline.reset();
        self.alpha_mu.reset();
        self.alpha_c.reset();
        self.phase = LearnerPhase::Ready;
        self.draw = None;
        self.reward = None;
    }
}
