pub mod cli;
pub mod config;
pub mod error;
pub mod rl;

pub use config::AppConfig;
pub use error::{Result, TradelabError};

pub use rl::{
    AllocationTask, ExperimentSettings, MarketEnvironment, NpgpeLearner, RLConfig, ReturnSeries,
    TradingSystem,
};
