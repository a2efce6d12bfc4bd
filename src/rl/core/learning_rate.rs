//! Learning Rate Schedule
//!
//! Epoch-indexed decay `constant / n^exponent` with `n` starting at 1.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningRate {
    constant: f64,
    exponent: f64,
    epoch: u64,
}

impl LearningRate {
    pub fn new(constant: f64, exponent: f64) -> Self {
        Self {
            constant,
            exponent,
            epoch: 1,
        }
    }

    /// Rate for the current epoch
    pub fn get(&self) -> f64 {
        self.constant / (self.epoch as f64).powf(self.exponent)
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn advance(&mut self) {
        self.epoch += 1;
    }

    pub fn reset(&mut self) {
        self.epoch = 1;
    }
}
