use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::AppConfig;
use crate::rl::{ControllerKind, LearnerKind};

/// Runtime CLI for training, backtesting and data generation.
#[derive(Parser, Debug)]
#[command(name = "tradelab")]
#[command(version = "0.1.0")]
#[command(
    about = "NPGPE asset allocation under transaction costs",
    long_about = None
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Extra config file layered over config/default.toml
    #[arg(short, long, global = true, env = "TRADELAB_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding default.toml and the environment files
    #[arg(long, global = true, default_value = "config")]
    pub config_dir: PathBuf,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train and backtest independent repetitions of an experiment
    Run(RunArgs),

    /// Write a synthetic return series CSV
    Generate {
        /// Price process
        #[arg(value_enum)]
        kind: GenerateKind,
        /// Number of return rows
        #[arg(short, long, default_value = "1000")]
        rows: usize,
        /// RNG seed
        #[arg(short, long, default_value = "215")]
        seed: u64,
        /// Output CSV path
        #[arg(short, long, default_value = "./data/synthetic.csv")]
        output: PathBuf,
        /// First date label; rows follow on consecutive weekdays
        #[arg(long, default_value = "2000-01-03")]
        start: NaiveDate,
    },

    /// Print the effective configuration and experiment code
    Info {
        /// Print JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum GenerateKind {
    /// AR(1)-trend log-price random walk, one asset
    Synthetic,
    /// GBM leg plus mean-reverting spread leg, two assets
    Cointegrated,
}

/// Flags of `tradelab run`; each one overrides the loaded config
#[derive(Args, Debug, Default, Clone)]
pub struct RunArgs {
    /// Return series CSV
    #[arg(short, long)]
    pub input: Option<String>,
    /// Base output directory
    #[arg(short, long)]
    pub output: Option<String>,
    /// Number of independent repetitions
    #[arg(long)]
    pub experiments: Option<usize>,
    /// Training epochs per repetition
    #[arg(long)]
    pub epochs: Option<usize>,
    /// Learner objective (npgpe, risk-sensitive)
    #[arg(long)]
    pub learner: Option<LearnerKind>,
    /// Controller family (softmax, discrete)
    #[arg(long)]
    pub controller: Option<ControllerKind>,
    /// Base seed; repetition n uses seed + n
    #[arg(long)]
    pub seed: Option<u64>,
    /// Proportional transaction cost
    #[arg(long)]
    pub delta_p: Option<f64>,
    /// Fixed transaction cost
    #[arg(long)]
    pub delta_f: Option<f64>,
    /// Short-selling cost
    #[arg(long)]
    pub delta_s: Option<f64>,
    /// Observation window
    #[arg(long)]
    pub window: Option<usize>,
    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl RunArgs {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(input) = &self.input {
            config.market.input_path = input.clone();
        }
        if let Some(output) = &self.output {
            config.experiment.output_dir = output.clone();
        }
        if let Some(n) = self.experiments {
            config.experiment.num_experiments = n;
        }
        if let Some(n) = self.epochs {
            config.experiment.num_epochs = n;
        }
        if let Some(kind) = self.learner {
            config.learner.kind = kind;
        }
        if let Some(kind) = self.controller {
            config.controller.kind = kind;
        }
        if let Some(seed) = self.seed {
            config.learner.seed = seed;
        }
        if let Some(x) = self.delta_p {
            config.costs.delta_p = x;
        }
        if let Some(x) = self.delta_f {
            config.costs.delta_f = x;
        }
        if let Some(x) = self.delta_s {
            config.costs.delta_s = x;
        }
        if let Some(window) = self.window {
            config.market.window = window;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_run_overrides() {
        let cli = Cli::try_parse_from([
            "tradelab",
            "run",
            "--input",
            "spy.csv",
            "--controller",
            "discrete",
            "--learner",
            "rsnpgpe",
            "--delta-p",
            "0.0005",
            "--window",
            "10",
            "--json",
        ])
        .unwrap();

        let Commands::Run(args) = cli.command else {
            panic!("expected run command");
        };
        assert!(args.json);

        let mut config = AppConfig::default();
        args.apply(&mut config);
        assert_eq!(config.market.input_path, "spy.csv");
        assert_eq!(config.controller.kind, ControllerKind::Discrete);
        assert_eq!(config.learner.kind, LearnerKind::RiskSensitive);
        assert_eq!(config.costs.delta_p, 0.0005);
        assert_eq!(config.market.window, 10);
        // not given, not touched
        assert_eq!(config.experiment.num_epochs, 100);
    }

    #[test]
    fn test_parse_generate() {
        let cli = Cli::try_parse_from(["tradelab", "generate", "cointegrated", "--rows", "50"])
            .unwrap();
        match cli.command {
            Commands::Generate {
                kind, rows, start, ..
            } => {
                assert_eq!(kind, GenerateKind::Cointegrated);
                assert_eq!(rows, 50);
                assert_eq!(start, NaiveDate::from_ymd_opt(2000, 1, 3).unwrap());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_unknown_controller_rejected() {
        assert!(Cli::try_parse_from(["tradelab", "run", "--controller", "gaussian"]).is_err());
    }
}
