//! RL Configuration
//!
//! Configuration structs for the learning core. Every constant the learner,
//! controller and task depend on lives here and is handed to constructors.

use serde::{Deserialize, Serialize};

/// Main RL configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RLConfig {
    /// NPGPE learner hyperparameters
    #[serde(default)]
    pub learner: NpgpeConfig,
    /// Transaction cost model
    #[serde(default)]
    pub costs: CostConfig,
    /// Controller family
    #[serde(default)]
    pub controller: ControllerConfig,
    /// Allocation task behaviour
    #[serde(default)]
    pub task: TaskConfig,
    /// Experiment schedule
    #[serde(default)]
    pub experiment: ExperimentConfig,
}

/// Objective optimised by the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LearnerKind {
    /// Average reward
    Npgpe,
    /// Sharpe ratio of the reward, from first and second moment baselines
    RiskSensitive,
}

impl LearnerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Npgpe => "npgpe",
            Self::RiskSensitive => "risk_sensitive",
        }
    }

    /// Tag used in experiment codes: risk neutral or risk sensitive
    pub fn code(&self) -> &'static str {
        match self {
            Self::Npgpe => "RN",
            Self::RiskSensitive => "RS",
        }
    }
}

impl Default for LearnerKind {
    fn default() -> Self {
        Self::Npgpe
    }
}

impl std::str::FromStr for LearnerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "npgpe" | "rn" => Ok(Self::Npgpe),
            "risk_sensitive" | "rsnpgpe" | "rs" => Ok(Self::RiskSensitive),
            other => Err(format!("unknown learner kind: {other}")),
        }
    }
}

/// NPGPE learner hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NpgpeConfig {
    /// Average-reward or Sharpe-ratio objective
    pub kind: LearnerKind,
    /// Learning rate for the mean vector
    pub alpha_mu: f64,
    /// Learning rate for the Cholesky factor
    pub alpha_c: f64,
    /// Per-epoch decay exponent applied to both learning rates (0 = constant)
    pub alpha_exp: f64,
    /// Decay of the gradient traces
    pub gamma: f64,
    /// Initial diagonal of the Cholesky factor
    pub epsilon: f64,
    /// Blend factor of the reward baseline (0.1 means 0.9 * old + 0.1 * new)
    pub baseline_rate: f64,
    /// Seed of the parameter sampler
    pub seed: u64,
    /// Smallest admissible magnitude of a Cholesky diagonal entry
    pub min_cholesky_diag: f64,
    /// Reward variance below which the risk-sensitive step is skipped
    pub min_variance: f64,
}

impl Default for NpgpeConfig {
    fn default() -> Self {
        Self {
            alpha_mu: 0.1,
            alpha_c: 0.05,
            alpha_exp: 0.0,
            gamma: 0.9,
            epsilon: 1.0,
            baseline_rate: 0.1,
            seed: 215,
            min_cholesky_diag: 1e-12,
            min_variance: 1e-12,
            kind: LearnerKind::Npgpe,
        }
    }
}

/// When the fixed transaction cost is charged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedCostTrigger {
    /// Charge once whenever the allocation changes
    OnReallocation,
    /// Charge once whenever some weight is left unchanged
    OnUnchangedComponent,
}

impl Default for FixedCostTrigger {
    fn default() -> Self {
        Self::OnReallocation
    }
}

/// Transaction cost model
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CostConfig {
    /// Proportional cost rate on turnover
    pub delta_p: f64,
    /// Fixed cost per rebalancing
    pub delta_f: f64,
    /// Borrowing cost rate on short positions
    pub delta_s: f64,
    /// Trigger of the fixed cost
    pub fixed_cost_trigger: FixedCostTrigger,
}

impl CostConfig {
    /// Cost model without any friction
    pub fn frictionless() -> Self {
        Self::default()
    }

    pub fn validate(&self, errors: &mut Vec<String>) {
        for (name, value) in [
            ("delta_p", self.delta_p),
            ("delta_f", self.delta_f),
            ("delta_s", self.delta_s),
        ] {
            if !(value >= 0.0) {
                errors.push(format!("costs.{name} must be non-negative, got {value}"));
            }
        }
    }
}

/// Controller family used by the learner
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControllerKind {
    /// Long-only softmax allocation over every asset
    Softmax,
    /// Short / neutral / long on each risky asset
    Discrete,
}

impl ControllerKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Softmax => "softmax",
            Self::Discrete => "discrete",
        }
    }
}

impl std::str::FromStr for ControllerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "softmax" => Ok(Self::Softmax),
            "discrete" => Ok(Self::Discrete),
            other => Err(format!("unknown controller kind: {other}")),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub kind: ControllerKind,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            kind: ControllerKind::Softmax,
        }
    }
}

/// Episodic or continuing interaction with the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskMode {
    /// Never terminates inside a run; the caller resets at epoch boundaries
    Continuous,
    /// Resets the held allocation every `horizon` steps
    Episodic,
}

/// Allocation task configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskConfig {
    pub mode: TaskMode,
    /// Episode length for the episodic mode
    pub horizon: usize,
    /// Rescale drifted weights so they sum to one
    pub renormalize_allocation: bool,
    /// Restart episodes from a random simplex point instead of all risk-free
    pub random_reset: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            mode: TaskMode::Continuous,
            horizon: 0,
            renormalize_allocation: true,
            random_reset: false,
        }
    }
}

/// Experiment schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Number of independent repetitions
    pub num_experiments: usize,
    /// Training epochs per repetition
    pub num_epochs: usize,
    /// Learning steps per epoch
    pub num_training_steps: usize,
    /// Backtest steps after training
    pub num_test_steps: usize,
    /// Base output directory
    pub output_dir: String,
    /// Log running statistics every n steps (0 disables)
    pub report_every: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            num_experiments: 1,
            num_epochs: 100,
            num_training_steps: 1000,
            num_test_steps: 100,
            output_dir: "./data/output".to_string(),
            report_every: 50,
        }
    }
}

impl RLConfig {
    /// Collect every violated constraint
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        let learner = &self.learner;
        if !(learner.gamma >= 0.0) {
            errors.push(format!("learner.gamma must be non-negative, got {}", learner.gamma));
        }
        if !(learner.epsilon > 0.0) {
            errors.push(format!("learner.epsilon must be positive, got {}", learner.epsilon));
        }
        if !(learner.baseline_rate > 0.0 && learner.baseline_rate <= 1.0) {
            errors.push(format!(
                "learner.baseline_rate must be in (0, 1], got {}",
                learner.baseline_rate
            ));
        }
        if !(learner.alpha_mu >= 0.0) || !(learner.alpha_c >= 0.0) {
            errors.push("learner learning rates must be non-negative".to_string());
        }
        if !(learner.alpha_exp >= 0.0) {
            errors.push("learner.alpha_exp must be non-negative".to_string());
        }
        if !(learner.min_variance >= 0.0) {
            errors.push("learner.min_variance must be non-negative".to_string());
        }

        self.costs.validate(&mut errors);

        if self.task.mode == TaskMode::Episodic && self.task.horizon == 0 {
            errors.push("task.horizon must be positive for episodic tasks".to_string());
        }

        let exp = &self.experiment;
        if exp.num_experiments == 0 {
            errors.push("experiment.num_experiments must be positive".to_string());
        }
        if exp.num_epochs == 0 || exp.num_training_steps == 0 {
            errors.push("experiment training budget must be positive".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RLConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_collects_all_errors() {
        let mut config = RLConfig::default();
        config.costs.delta_p = -0.1;
        config.learner.baseline_rate = 0.0;
        config.task.mode = TaskMode::Episodic;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn test_controller_kind_parse() {
        assert_eq!("Softmax".parse::<ControllerKind>(), Ok(ControllerKind::Softmax));
        assert_eq!("discrete".parse::<ControllerKind>(), Ok(ControllerKind::Discrete));
        assert!("gaussian".parse::<ControllerKind>().is_err());
    }

    #[test]
    fn test_learner_kind_parse_and_serde() {
        assert_eq!("RSNPGPE".parse::<LearnerKind>(), Ok(LearnerKind::RiskSensitive));
        assert_eq!("risk-sensitive".parse::<LearnerKind>(), Ok(LearnerKind::RiskSensitive));
        assert_eq!("npgpe".parse::<LearnerKind>(), Ok(LearnerKind::Npgpe));
        assert!("pgpe".parse::<LearnerKind>().is_err());

        let learner: NpgpeConfig = toml::from_str("kind = \"risk_sensitive\"").unwrap();
        assert_eq!(learner.kind, LearnerKind::RiskSensitive);
        assert_eq!(learner.alpha_mu, 0.1);
        assert_eq!(NpgpeConfig::default().kind.code(), "RN");
    }

    #[test]
    fn test_fixed_cost_trigger_serde() {
        let costs: CostConfig =
            toml::from_str("delta_f = 0.01\nfixed_cost_trigger = \"on_unchanged_component\"")
                .unwrap();
        assert_eq!(costs.fixed_cost_trigger, FixedCostTrigger::OnUnchangedComponent);
        assert_eq!(costs.delta_p, 0.0);
    }
}
