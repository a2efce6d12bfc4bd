//! Exponential Moving Average
//!
//! Running mean with a decaying blend rate `schedule_const / n^schedule_exp`,
//! where `n` counts the updates folded in so far.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TradelabError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExponentialMovingAverage {
    schedule_const: f64,
    schedule_exp: f64,
    num_updates: u64,
    value: Option<f64>,
}

impl ExponentialMovingAverage {
    pub fn new(schedule_const: f64, schedule_exp: f64) -> Self {
        Self {
            schedule_const,
            schedule_exp,
            num_updates: 0,
            value: None,
        }
    }

    /// Constant blend rate, e.g. 0.1 for `0.9 * old + 0.1 * new`
    pub fn constant(rate: f64) -> Self {
        Self::new(rate, 0.0)
    }

    /// Blend rate used by the next update
    pub fn current_rate(&self) -> f64 {
        if self.num_updates == 0 {
            1.0
        } else {
            self.schedule_const / (self.num_updates as f64).powf(self.schedule_exp)
        }
    }

    pub fn update(&mut self, sample: f64) {
        let rate = self.current_rate();
        self.value = Some(match self.value {
            // first sample replaces the estimate
            None => sample,
            Some(value) => value + rate * (sample - value),
        });
        self.num_updates += 1;
    }

    /// Current estimate
    pub fn get(&self) -> Result<f64> {
        self.value.ok_or_else(|| {
            TradelabError::Domain("moving average read before any update".to_string())
        })
    }

    /// Current estimate, `None` before the first update
    pub fn value(&self) -> Option<f64> {
        self.value
    }

    pub fn num_updates(&self) -> u64 {
        self.num_updates
    }

    pub fn reset(&mut self) {
        self.num_updates = 0;
        self.value = None;
    }
}
