//! Market Environment
//!
//! Replays a return series augmented with a constant-rate risk-free asset.
//! Allocations are assumed not to move prices, so the market only keeps a
//! clock over the evaluation interval.

use ndarray::{s, Array1, Array2, ArrayView1};

use crate::error::{Result, TradelabError};
use crate::rl::environment::series::ReturnSeries;

/// Name of the risk-free column
pub const RISK_FREE_ASSET: &str = "RF";

#[derive(Debug, Clone)]
pub struct MarketEnvironment {
    dates: Vec<String>,
    assets: Vec<String>,
    /// N x (I + 1), risk-free first
    data: Array2<f64>,
    risk_free_rate: f64,
    window: usize,
    start: usize,
    end: usize,
    current: usize,
}

impl MarketEnvironment {
    /// Wrap `series`, prepending a risk-free asset that earns `risk_free_rate`
    /// per step. Observations carry the last `window` rows of returns.
    ///
    /// The evaluation interval defaults to `[window, N)` so the first
    /// observation is made of actual history.
    pub fn new(series: &ReturnSeries, risk_free_rate: f64, window: usize) -> Result<Self> {
        let n = series.len();
        if n == 0 {
            return Err(TradelabError::InvalidMarketData(
                "return series is empty".to_string(),
            ));
        }
        if window >= n {
            return Err(TradelabError::InvalidMarketData(format!(
                "observation window {window} leaves no data in a series of {n} rows"
            )));
        }

        let num_assets = series.assets().len() + 1;
        let mut data = Array2::from_elem((n, num_assets), risk_free_rate);
        data.slice_mut(s![.., 1..]).assign(series.returns());

        let mut assets = Vec::with_capacity(num_assets);
        assets.push(RISK_FREE_ASSET.to_string());
        assets.extend(series.assets().iter().cloned());

        Ok(Self {
            dates: series.dates().to_vec(),
            assets,
            data,
            risk_free_rate,
            window,
            start: window,
            end: n,
            current: window,
        })
    }

    /// Number of rows in the underlying series
    pub fn num_samples(&self) -> usize {
        self.data.nrows()
    }

    /// Number of assets including the risk-free one
    pub fn num_assets(&self) -> usize {
        self.data.ncols()
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn risk_free_rate(&self) -> f64 {
        self.risk_free_rate
    }

    /// Length of the past-returns part of an observation
    pub fn observation_size(&self) -> usize {
        self.window * self.num_assets()
    }

    /// Restrict evaluation to `[start, end)` and move the clock to `start`.
    /// Rows before index 0 that fall into the window read as zero returns.
    pub fn set_evaluation_interval(&mut self, start: usize, end: usize) -> Result<()> {
        if start >= end || end > self.num_samples() {
            return Err(TradelabError::Validation(format!(
                "invalid evaluation interval [{start}, {end}) for {} samples",
                self.num_samples()
            )));
        }
        self.start = start;
        self.end = end;
        self.current = start;
        Ok(())
    }

    pub fn evaluation_interval(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current_date(&self) -> Option<&str> {
        self.dates.get(self.current).map(String::as_str)
    }

    pub fn is_exhausted(&self) -> bool {
        self.current >= self.end
    }

    /// Flattened returns of the `window` rows preceding the current index
    pub fn past_returns(&self) -> Array1<f64> {
        let num_assets = self.num_assets();
        let mut past = Array1::zeros(self.observation_size());
        let first = self.current as isize - self.window as isize;
        for (k, t) in (first..self.current as isize).enumerate() {
            if t >= 0 {
                past.slice_mut(s![k * num_assets..(k + 1) * num_assets])
                    .assign(&self.data.row(t as usize));
            }
        }
        past
    }

    /// Returns realized over the current step
    pub fn asset_returns(&self) -> Result<ArrayView1<'_, f64>> {
        if self.is_exhausted() {
            return Err(TradelabError::InvalidState(format!(
                "market exhausted at index {} (interval end {})",
                self.current, self.end
            )));
        }
        Ok(self.data.row(self.current))
    }

    pub fn advance(&mut self) {
        if self.current < self.end {
            self.current += 1;
        }
    }

    pub fn reset(&mut self) {
        self.current = self.start;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn series() -> ReturnSeries {
        ReturnSeries::from_matrix(
            vec!["A".into(), "B".into()],
            array![[0.01, 0.02], [0.03, 0.04], [0.05, 0.06], [0.07, 0.08]],
        )
        .unwrap()
    }

    #[test]
    fn test_risk_free_column_is_prepended() {
        let market = MarketEnvironment::new(&series(), 0.001, 1).unwrap();
        assert_eq!(market.assets(), &["RF".to_string(), "A".to_string(), "B".to_string()]);
        assert_eq!(market.num_assets(), 3);
        assert_eq!(market.observation_size(), 3);
        assert_eq!(market.current_index(), 1);
        assert_eq!(market.asset_returns().unwrap(), array![0.001, 0.03, 0.04].view());
    }

    #[test]
    fn test_past_returns_window() {
        let mut market = MarketEnvironment::new(&series(), 0.0, 2).unwrap();
        market.set_evaluation_interval(0, 4).unwrap();
        assert_eq!(market.past_returns(), Array1::<f64>::zeros(6));

        market.advance();
        assert_eq!(market.past_returns(), array![0.0, 0.0, 0.0, 0.0, 0.01, 0.02]);

        market.advance();
        market.advance();
        assert_eq!(market.past_returns(), array![0.0, 0.03, 0.04, 0.0, 0.05, 0.06]);
    }

    #[test]
    fn test_interval_and_exhaustion() {
        let mut market = MarketEnvironment::new(&series(), 0.0, 1).unwrap();
        assert!(market.set_evaluation_interval(2, 2).is_err());
        assert!(market.set_evaluation_interval(1, 5).is_err());

        market.set_evaluation_interval(2, 4).unwrap();
        assert_eq!(market.current_date(), Some("2"));
        market.advance();
        market.advance();
        assert!(market.is_exhausted());
        assert!(market.asset_returns().is_err());
        market.advance();
        assert_eq!(market.current_index(), 4);

        market.reset();
        assert_eq!(market.current_index(), 2);
    }

    #[test]
    fn test_window_longer_than_series() {
        assert!(MarketEnvironment::new(&series(), 0.0, 4).is_err());
    }
}
