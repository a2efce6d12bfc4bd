//! Portfolio Performance
//!
//! Single-period portfolio returns net of proportional, fixed and
//! short-selling transaction costs. Every function here is pure, so a
//! backtest can recompute identical statistics from a report.

use ndarray::{ArrayView1, Zip};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TradelabError};
use crate::rl::config::{CostConfig, FixedCostTrigger};

/// Detailed breakdown of one rebalancing step
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnBreakdown {
    /// Return of the new allocation before costs
    pub gross_return: f64,
    /// Sum of absolute weight changes
    pub turnover: f64,
    /// Proportional cost (positive number, subtracted)
    pub proportional_cost: f64,
    /// Short-selling cost (non-positive number, added)
    pub short_cost: f64,
    /// Fixed cost (positive number, subtracted)
    pub fixed_cost: f64,
    /// Net simple return
    pub simple_return: f64,
}

impl ReturnBreakdown {
    /// Net log-return, or a domain error when the wealth is wiped out
    pub fn log_return(&self) -> Result<f64> {
        log_return(self.simple_return)
    }
}

/// Compute the cost breakdown of moving from `old_allocation` to
/// `new_allocation` and holding it over a period with `asset_returns`.
pub fn portfolio_breakdown(
    asset_returns: ArrayView1<'_, f64>,
    old_allocation: ArrayView1<'_, f64>,
    new_allocation: ArrayView1<'_, f64>,
    costs: &CostConfig,
) -> Result<ReturnBreakdown> {
    let n = asset_returns.len();
    TradelabError::check_len("old allocation", n, old_allocation.len())?;
    TradelabError::check_len("new allocation", n, new_allocation.len())?;

    let gross_return = new_allocation.dot(&asset_returns);

    let mut turnover = 0.0;
    let mut any_changed = false;
    let mut any_unchanged = false;
    Zip::from(&new_allocation)
        .and(&old_allocation)
        .for_each(|&new, &old| {
            let diff = new - old;
            turnover += diff.abs();
            if diff.abs() > f64::EPSILON {
                any_changed = true;
            }
            if diff == 0.0 {
                any_unchanged = true;
            }
        });

    let short_exposure: f64 = new_allocation.iter().map(|w| w.min(0.0)).sum();

    let charged = match costs.fixed_cost_trigger {
        FixedCostTrigger::OnReallocation => any_changed,
        FixedCostTrigger::OnUnchangedComponent => any_unchanged,
    };

    let proportional_cost = costs.delta_p * turnover;
    let short_cost = costs.delta_s * short_exposure;
    let fixed_cost = if charged { costs.delta_f } else { 0.0 };

    Ok(ReturnBreakdown {
        gross_return,
        turnover,
        proportional_cost,
        short_cost,
        fixed_cost,
        simple_return: gross_return - proportional_cost + short_cost - fixed_cost,
    })
}

/// Portfolio simple return net of transaction costs
pub fn portfolio_return(
    asset_returns: ArrayView1<'_, f64>,
    old_allocation: ArrayView1<'_, f64>,
    new_allocation: ArrayView1<'_, f64>,
    costs: &CostConfig,
) -> Result<f64> {
    portfolio_breakdown(asset_returns, old_allocation, new_allocation, costs)
        .map(|b| b.simple_return)
}

/// Portfolio log-return net of transaction costs
pub fn portfolio_log_return(
    asset_returns: ArrayView1<'_, f64>,
    old_allocation: ArrayView1<'_, f64>,
    new_allocation: ArrayView1<'_, f64>,
    costs: &CostConfig,
) -> Result<f64> {
    portfolio_breakdown(asset_returns, old_allocation, new_allocation, costs)?.log_return()
}

/// `ln(1 + r)`, defined only for `r > -1`
pub fn log_return(simple_return: f64) -> Result<f64> {
    if simple_return > -1.0 {
        Ok(simple_return.ln_1p())
    } else {
        Err(TradelabError::Domain(format!(
            "log-return undefined for simple return {simple_return} (must exceed -1)"
        )))
    }
}
