//! Market Environment for Asset Allocation
//!
//! Return series I/O, a replaying market with a risk-free asset, the
//! allocation task built on top of it, and synthetic data generators.

mod allocation;
mod market;
mod series;
mod synthetic;

pub use allocation::{random_simplex_point, risk_free_allocation, AllocationTask};
pub use market::{MarketEnvironment, RISK_FREE_ASSET};
pub use series::ReturnSeries;
pub use synthetic::{prices_to_returns, CointegratedGenerator, PriceGenerator};
