//! Tradelab CLI
//!
//! Commands:
//! - `tradelab run` - Train and backtest NPGPE allocation experiments
//! - `tradelab generate` - Write synthetic return series
//! - `tradelab info` - Show the effective configuration

pub mod output;
pub mod runtime;

pub use output::{print_items, print_kv, print_success, print_warn, OutputMode};
pub use runtime::{Cli, Commands, GenerateKind, RunArgs};
