//! Backtest and Convergence Reports
//!
//! Flat CSV outputs consumed by the aggregation scripts:
//! - backtest: `date, r_<asset>..., a_<asset>..., logReturn`
//! - convergence: `epoch, average, stdev, sharpe`

use std::path::Path;

use ndarray::Array1;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TradelabError};
use crate::rl::core::StepOutcome;
use crate::rl::training::statistics::RunningStatistics;

/// One evaluated step of a backtest
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestRow {
    pub time_index: usize,
    pub date: String,
    pub asset_returns: Array1<f64>,
    pub allocation: Array1<f64>,
    pub log_return: f64,
}

impl From<&StepOutcome> for BacktestRow {
    fn from(outcome: &StepOutcome) -> Self {
        Self {
            time_index: outcome.time_index,
            date: outcome.date.clone(),
            asset_returns: outcome.asset_returns.clone(),
            allocation: outcome.allocation.clone(),
            log_return: outcome.log_return,
        }
    }
}

/// Append-only table of backtest rows
#[derive(Debug, Clone, Default)]
pub struct BacktestReport {
    assets: Vec<String>,
    rows: Vec<BacktestRow>,
}

impl BacktestReport {
    pub fn new(assets: Vec<String>) -> Self {
        Self {
            assets,
            rows: Vec::new(),
        }
    }

    pub fn assets(&self) -> &[String] {
        &self.assets
    }

    pub fn rows(&self) -> &[BacktestRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: BacktestRow) -> Result<()> {
        TradelabError::check_len(
            "report asset returns",
            self.assets.len(),
            row.asset_returns.len(),
        )?;
        TradelabError::check_len("report allocation", self.assets.len(), row.allocation.len())?;
        self.rows.push(row);
        Ok(())
    }

    pub fn cumulative_log_return(&self) -> f64 {
        self.rows.iter().map(|r| r.log_return).sum()
    }

    pub fn statistics(&self) -> RunningStatistics {
        self.rows.iter().map(|r| r.log_return).collect()
    }

    pub fn header(&self) -> Vec<String> {
        let mut header = vec!["date".to_string()];
        header.extend(self.assets.iter().map(|a| format!("r_{a}")));
        header.extend(self.assets.iter().map(|a| format!("a_{a}")));
        header.push("logReturn".to_string());
        header
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(self.header())?;
        for row in &self.rows {
            let mut record = vec![row.date.clone()];
            record.extend(row.asset_returns.iter().map(|r| r.to_string()));
            record.extend(row.allocation.iter().map(|a| a.to_string()));
            record.push(row.log_return.to_string());
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }
}

/// Reward statistics of one training epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EpochStats {
    pub epoch: usize,
    pub average: f64,
    pub stdev: f64,
    pub sharpe: f64,
}

impl EpochStats {
    pub fn from_statistics(epoch: usize, stats: &RunningStatistics) -> Self {
        Self {
            epoch,
            average: stats.mean(),
            stdev: stats.stdev(),
            sharpe: stats.sharpe(),
        }
    }
}

/// Per-epoch learning curve
#[derive(Debug, Clone, Default)]
pub struct ConvergenceReport {
    epochs: Vec<EpochStats>,
}

impl ConvergenceReport {
    pub fn push(&mut self, stats: EpochStats) {
        self.epochs.push(stats);
    }

    pub fn epochs(&self) -> &[EpochStats] {
        &self.epochs
    }

    pub fn last(&self) -> Option<&EpochStats> {
        self.epochs.last()
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = csv::Writer::from_path(path)?;
        writer.write_record(["epoch", "average", "stdev", "sharpe"])?;
        for stats in &self.epochs {
            writer.write_record(&[
                stats.epoch.to_string(),
                stats.average.to_string(),
                stats.stdev.to_string(),
                stats.sharpe.to_string(),
            ])?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn row(t: usize, log_return: f64) -> BacktestRow {
        BacktestRow {
            time_index: t,
            date: format!("d{t}"),
            asset_returns: array![0.0, 0.01],
            allocation: array![0.5, 0.5],
            log_return,
        }
    }

    #[test]
    fn test_backtest_header() {
        let report = BacktestReport::new(vec!["RF".into(), "SPY".into()]);
        assert_eq!(
            report.header(),
            vec!["date", "r_RF", "r_SPY", "a_RF", "a_SPY", "logReturn"]
        );
    }

    #[test]
    fn test_push_checks_width() {
        let mut report = BacktestReport::new(vec!["RF".into()]);
        assert!(report.push(row(0, 0.0)).is_err());
        assert!(report.is_empty());
    }

    #[test]
    fn test_cumulative_log_return() {
        let mut report = BacktestReport::new(vec!["RF".into(), "SPY".into()]);
        for (t, r) in [0.01, -0.02, 0.005].into_iter().enumerate() {
            report.push(row(t, r)).unwrap();
        }
        assert_eq!(report.len(), 3);
        approx::assert_abs_diff_eq!(report.cumulative_log_return(), -0.005, epsilon = 1e-15);
        assert_eq!(report.statistics().count(), 3);
    }
}
