use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::rl::{
    ControllerConfig, CostConfig, ExperimentConfig, ExperimentSettings, NpgpeConfig, RLConfig,
    TaskConfig,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub costs: CostConfig,
    #[serde(default)]
    pub learner: NpgpeConfig,
    #[serde(default)]
    pub controller: ControllerConfig,
    #[serde(default)]
    pub task: TaskConfig,
    #[serde(default)]
    pub experiment: ExperimentConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Return series CSV (date column first, one column per risky asset)
    pub input_path: String,
    /// Per-step return of the risk-free asset
    pub risk_free_rate: f64,
    /// Number of past return rows in an observation
    pub window: usize,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            input_path: "./data/returns.csv".to_string(),
            risk_free_rate: 0.0,
            window: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Enable JSON formatted logs
    #[serde(default)]
    pub json: bool,
    /// Directory of the daily rolling log file
    #[serde(default)]
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
            dir: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Load configuration from files and environment
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("config", None)
    }

    /// Load configuration from a specific directory, plus an optional extra file
    pub fn load_from<P: AsRef<Path>>(
        config_dir: P,
        extra_file: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let mut builder = Config::builder()
            .set_default("logging.level", "info")?
            .set_default("logging.json", false)?
            // Load default config file
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Load environment-specific config (e.g., config/paper.toml)
            .add_source(
                File::from(config_dir.join(
                    std::env::var("TRADELAB_ENV").unwrap_or_else(|_| "development".to_string()),
                ))
                .required(false),
            );

        if let Some(path) = extra_file {
            builder = builder.add_source(File::from(PathBuf::from(path)).required(true));
        }

        // Override with environment variables (TRADELAB__COSTS__DELTA_P, etc.)
        builder
            .add_source(
                Environment::with_prefix("TRADELAB")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }

    /// The learning-core view of this configuration
    pub fn rl_config(&self) -> RLConfig {
        RLConfig {
            learner: self.learner.clone(),
            costs: self.costs.clone(),
            controller: self.controller.clone(),
            task: self.task.clone(),
            experiment: self.experiment.clone(),
        }
    }

    pub fn experiment_settings(&self) -> ExperimentSettings {
        ExperimentSettings {
            rl: self.rl_config(),
            risk_free_rate: self.market.risk_free_rate,
            window: self.market.window,
        }
    }

    /// Snapshot written next to the results as `parameters.toml`
    pub fn to_toml(&self) -> crate::error::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = match self.rl_config().validate() {
            Ok(()) => Vec::new(),
            Err(errors) => errors,
        };

        if self.market.input_path.trim().is_empty() {
            errors.push("market.input_path must not be empty".to_string());
        }
        if !self.market.risk_free_rate.is_finite() || self.market.risk_free_rate <= -1.0 {
            errors.push(format!(
                "market.risk_free_rate must be finite and above -1, got {}",
                self.market.risk_free_rate
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
