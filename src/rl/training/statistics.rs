//! Running reward statistics (Welford's algorithm)

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningStatistics {
    count: u64,
    mean: f64,
    m2: f64,
}

impl RunningStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance, zero with fewer than two values
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    pub fn stdev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Mean over standard deviation, zero when the deviation vanishes
    pub fn sharpe(&self) -> f64 {
        let stdev = self.stdev();
        if stdev > 0.0 {
            self.mean / stdev
        } else {
            0.0
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

impl FromIterator<f64> for RunningStatistics {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        for value in iter {
            stats.push(value);
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_mean_and_stdev() {
        let stats: RunningStatistics =
            [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0].into_iter().collect();
        assert_eq!(stats.count(), 8);
        assert_relative_eq!(stats.mean(), 5.0);
        assert_relative_eq!(stats.variance(), 32.0 / 7.0, epsilon = 1e-12);
        assert_relative_eq!(stats.sharpe(), 5.0 / (32.0_f64 / 7.0).sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn test_degenerate_cases() {
        let mut stats = RunningStatistics::new();
        assert_eq!(stats.sharpe(), 0.0);
        stats.push(3.0);
        assert_eq!(stats.stdev(), 0.0);
        assert_eq!(stats.sharpe(), 0.0);

        stats.reset();
        assert_eq!(stats.count(), 0);
    }
}
