//! Synthetic Market Data
//!
//! Price generators for controlled experiments. Both produce price paths of
//! length `n + 1` and expose them as `n` simple returns.

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TradelabError};
use crate::rl::environment::series::ReturnSeries;

/// Simple returns `p[t] / p[t-1] - 1` of each price column
pub fn prices_to_returns(prices: &Array2<f64>) -> Result<Array2<f64>> {
    if prices.nrows() < 2 {
        return Err(TradelabError::InvalidMarketData(
            "at least two prices are needed to compute returns".to_string(),
        ));
    }
    let n = prices.nrows() - 1;
    let mut returns = Array2::zeros((n, prices.ncols()));
    for t in 0..n {
        let previous = prices.row(t);
        let current = prices.row(t + 1);
        returns.row_mut(t).assign(&(&current / &previous - 1.0));
    }
    if returns.iter().any(|r: &f64| !r.is_finite()) {
        return Err(TradelabError::Numerical(
            "price path produced non-finite returns".to_string(),
        ));
    }
    Ok(returns)
}

fn normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.sample(StandardNormal)
}

/// Log-price random walk with an AR(1) trend
///
/// `p[t] = p[t-1] + beta[t-1] + sigma * eps`, `beta[t] = alpha * beta[t-1] + nu`,
/// rescaled by the range of `p` and exponentiated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceGenerator {
    /// Persistence of the trend
    pub alpha: f64,
    /// Log-price noise scale
    pub sigma: f64,
}

impl Default for PriceGenerator {
    fn default() -> Self {
        Self {
            alpha: 0.9,
            sigma: 10.0,
        }
    }
}

impl PriceGenerator {
    pub fn generate_prices<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Array1<f64> {
        let mut log_price = Array1::zeros(n + 1);
        log_price[0] = 1.0;
        let mut beta = 0.0;
        for t in 1..=n {
            let eps = normal(rng);
            let nu = normal(rng);
            log_price[t] = log_price[t - 1] + beta + self.sigma * eps;
            beta = self.alpha * beta + nu;
        }

        let max = log_price.fold(f64::NEG_INFINITY, |m: f64, &v| m.max(v));
        let min = log_price.fold(f64::INFINITY, |m: f64, &v| m.min(v));
        let range = max - min;
        if range > 0.0 {
            log_price /= range;
        }
        log_price.mapv(f64::exp)
    }

    /// `n` simple returns of a single asset named `name`
    pub fn generate_returns<R: Rng + ?Sized>(
        &self,
        n: usize,
        name: &str,
        rng: &mut R,
    ) -> Result<ReturnSeries> {
        let prices = self.generate_prices(n, rng).insert_axis(Axis(1));
        ReturnSeries::from_matrix(vec![name.to_string()], prices_to_returns(&prices)?)
    }
}

/// Pair of cointegrated assets
///
/// The first leg is a geometric Brownian motion; the second follows the
/// first plus an Ornstein-Uhlenbeck spread and a small Brownian noise.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CointegratedGenerator {
    pub dt: f64,
    pub initial_price: f64,
    pub initial_spread: f64,
    pub sigma_1: f64,
    pub sigma_2: f64,
    pub sigma_gamma: f64,
    /// Mean-reversion rate of the spread
    pub theta: f64,
}

impl Default for CointegratedGenerator {
    fn default() -> Self {
        Self {
            dt: 1.0 / 250.0,
            initial_price: 100.0,
            initial_spread: 0.0,
            sigma_1: 0.3,
            sigma_2: 0.05,
            sigma_gamma: 0.15,
            theta: 0.05,
        }
    }
}

impl CointegratedGenerator {
    /// Price paths of shape `(n + 1, 2)`
    pub fn generate_prices<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Array2<f64> {
        let drift_1 = -0.5 * self.sigma_1.powi(2) * self.dt;
        let vol_1 = self.sigma_1 * self.dt.sqrt();
        let decay = (-self.theta * self.dt).exp();
        let vol_gamma = self.sigma_gamma
            * ((1.0 - (-2.0 * self.theta * self.dt).exp()) / (2.0 * self.theta)).sqrt();
        let vol_2 = self.sigma_2 * self.dt.sqrt();

        let log_initial = self.initial_price.ln();
        let mut prices = Array2::zeros((n + 1, 2));
        prices[[0, 0]] = self.initial_price;
        prices[[0, 1]] = self.initial_price;

        let mut log_s1 = log_initial;
        let mut spread = self.initial_spread;
        let mut noise = 0.0;
        for t in 1..=n {
            log_s1 += drift_1 + vol_1 * normal(rng);
            spread = decay * spread + vol_gamma * normal(rng);
            noise += normal(rng);
            let log_s2 = log_s1 + spread + vol_2 * noise;
            prices[[t, 0]] = log_s1.exp();
            prices[[t, 1]] = log_s2.exp();
        }
        prices
    }

    /// `n` simple returns of both legs
    pub fn generate_returns<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Result<ReturnSeries> {
        let prices = self.generate_prices(n, rng);
        ReturnSeries::from_matrix(
            vec!["ASSET_1".to_string(), "ASSET_2".to_string()],
            prices_to_returns(&prices)?,
        )
    }
}
