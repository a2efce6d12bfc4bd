//! RL Algorithms
//!
//! Policy search methods over controller parameters.

pub mod npgpe;

pub use npgpe::{LearnerPhase, NpgpeLearner, NpgpeSnapshot};
