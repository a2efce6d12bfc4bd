//! Controllers
//!
//! Stateless parametric policies mapping an observation to an allocation.
//! A controller holds only a flat parameter vector, which the learner
//! replaces wholesale before every decision.

use ndarray::{Array1, ArrayView1, ArrayView2};

use crate::error::{Result, TradelabError};
use crate::rl::config::ControllerKind;

/// Parametric policy
pub trait Controller: Send + std::fmt::Debug {
    /// Length of the observation vector
    fn input_size(&self) -> usize;

    /// Length of the produced allocation
    fn output_size(&self) -> usize;

    /// Length of the flat parameter vector
    fn num_parameters(&self) -> usize;

    /// Current parameters
    fn parameters(&self) -> ArrayView1<'_, f64>;

    /// Replace the parameter vector
    fn set_parameters(&mut self, parameters: ArrayView1<'_, f64>) -> Result<()>;

    /// Evaluate the policy on an observation
    fn activate(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>>;
}

/// Build the controller family selected in the configuration
pub fn build_controller(
    kind: ControllerKind,
    input_size: usize,
    num_assets: usize,
) -> Result<Box<dyn Controller>> {
    Ok(match kind {
        ControllerKind::Softmax => Box::new(SoftmaxController::new(input_size, num_assets)?),
        ControllerKind::Discrete => Box::new(DiscreteController::new(input_size, num_assets)?),
    })
}

/// Append the bias term to an observation
fn with_bias(input: ArrayView1<'_, f64>) -> Array1<f64> {
    let mut biased = Array1::ones(input.len() + 1);
    biased
        .slice_mut(ndarray::s![..input.len()])
        .assign(&input);
    biased
}

fn weights_view(parameters: &Array1<f64>, rows: usize, cols: usize) -> Result<ArrayView2<'_, f64>> {
    parameters
        .view()
        .into_shape((rows, cols))
        .map_err(|e| TradelabError::Internal(format!("parameter reshape failed: {e}")))
}

/// Long-only allocation `softmax(W [x; 1])` with `W` of shape `(n_out, n_in + 1)`
#[derive(Debug, Clone)]
pub struct SoftmaxController {
    input_size: usize,
    output_size: usize,
    parameters: Array1<f64>,
}

impl SoftmaxController {
    pub fn new(input_size: usize, output_size: usize) -> Result<Self> {
        if output_size == 0 {
            return Err(TradelabError::Validation(
                "softmax controller needs at least one output".to_string(),
            ));
        }
        Ok(Self {
            input_size,
            output_size,
            parameters: Array1::zeros((input_size + 1) * output_size),
        })
    }
}

impl Controller for SoftmaxController {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.output_size
    }

    fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    fn parameters(&self) -> ArrayView1<'_, f64> {
        self.parameters.view()
    }

    fn set_parameters(&mut self, parameters: ArrayView1<'_, f64>) -> Result<()> {
        TradelabError::check_len("controller parameters", self.parameters.len(), parameters.len())?;
        self.parameters.assign(&parameters);
        Ok(())
    }

    fn activate(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        TradelabError::check_len("controller input", self.input_size, input.len())?;

        let weights = weights_view(&self.parameters, self.output_size, self.input_size + 1)?;
        let logits = weights.dot(&with_bias(input));

        if logits.iter().any(|v| !v.is_finite()) {
            return Err(TradelabError::Numerical(format!(
                "softmax logits are not finite: {logits}"
            )));
        }
        // shift by the max logit so exp never overflows
        let max = logits.fold(f64::NEG_INFINITY, |m, &v| m.max(v));
        let exp = logits.mapv(|v| (v - max).exp());
        let total = exp.sum();
        Ok(exp / total)
    }
}

/// Short / neutral / long on every risky asset
///
/// Each risky weight is `sign(w_i [x; 1])` in `{-1, 0, 1}` and the risk-free
/// asset takes the remainder `1 - Σ risky`. With a single risky asset the
/// risk-free weight lies in `[0, 2]`; with more it can go negative.
#[derive(Debug, Clone)]
pub struct DiscreteController {
    input_size: usize,
    num_risky: usize,
    parameters: Array1<f64>,
}

impl DiscreteController {
    /// `num_assets` counts the risk-free asset
    pub fn new(input_size: usize, num_assets: usize) -> Result<Self> {
        if num_assets < 2 {
            return Err(TradelabError::Validation(format!(
                "discrete controller needs a risk-free and at least one risky asset, \
                 got {num_assets} assets"
            )));
        }
        let num_risky = num_assets - 1;
        Ok(Self {
            input_size,
            num_risky,
            parameters: Array1::zeros((input_size + 1) * num_risky),
        })
    }
}

impl Controller for DiscreteController {
    fn input_size(&self) -> usize {
        self.input_size
    }

    fn output_size(&self) -> usize {
        self.num_risky + 1
    }

    fn num_parameters(&self) -> usize {
        self.parameters.len()
    }

    fn parameters(&self) -> ArrayView1<'_, f64> {
        self.parameters.view()
    }

    fn set_parameters(&mut self, parameters: ArrayView1<'_, f64>) -> Result<()> {
        TradelabError::check_len("controller parameters", self.parameters.len(), parameters.len())?;
        self.parameters.assign(&parameters);
        Ok(())
    }

    fn activate(&self, input: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        TradelabError::check_len("controller input", self.input_size, input.len())?;

        let weights = weights_view(&self.parameters, self.num_risky, self.input_size + 1)?;
        let activations = weights.dot(&with_bias(input));

        let mut allocation: Array1<f64> = Array1::zeros(self.num_risky + 1);
        for (i, &a) in activations.iter().enumerate() {
            allocation[i + 1] = if a > 0.0 {
                1.0
            } else if a < 0.0 {
                -1.0
            } else if a == 0.0 {
                0.0
            } else {
                return Err(TradelabError::Numerical(format!(
                    "discrete controller activation {i} is NaN"
                )));
            };
        }
        allocation[0] = 1.0 - allocation.slice(ndarray::s![1..]).sum();
        Ok(allocation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn test_softmax_is_a_distribution() {
        let mut controller = SoftmaxController::new(4, 3).unwrap();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..50 {
            let params: Array1<f64> =
                (0..controller.num_parameters()).map(|_| rng.gen_range(-20.0..20.0)).collect();
            controller.set_parameters(params.view()).unwrap();

            let input: Array1<f64> = (0..4).map(|_| rng.gen_range(-1.0..1.0)).collect();
            let output = controller.activate(input.view()).unwrap();

            assert_eq!(output.len(), 3);
            assert_abs_diff_eq!(output.sum(), 1.0, epsilon = 1e-12);
            assert!(output.iter().all(|&w| w >= 0.0), "negative weight in {output}");
        }
    }

    #[test]
    fn test_softmax_large_logits_do_not_overflow() {
        let mut controller = SoftmaxController::new(1, 2).unwrap();
        controller
            .set_parameters(array![1000.0, 0.0, -1000.0, 0.0].view())
            .unwrap();
        let output = controller.activate(array![1.0].view()).unwrap();
        assert_abs_diff_eq!(output[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(output[1], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_softmax_rejects_single_nan_logit() {
        // only the second row is NaN; the first stays finite
        let mut controller = SoftmaxController::new(1, 2).unwrap();
        controller
            .set_parameters(array![1.0, 0.0, f64::NAN, 0.0].view())
            .unwrap();
        assert!(matches!(
            controller.activate(array![1.0].view()),
            Err(TradelabError::Numerical(_))
        ));

        controller
            .set_parameters(array![0.0, 0.0, f64::INFINITY, 0.0].view())
            .unwrap();
        assert!(controller.activate(array![1.0].view()).is_err());
    }

    #[test]
    fn test_softmax_parameter_layout() {
        // row-major (n_out, n_in + 1) with the bias last
        let mut controller = SoftmaxController::new(1, 2).unwrap();
        controller
            .set_parameters(array![0.0, 0.0, 0.0, 2.0_f64.ln()].view())
            .unwrap();
        let output = controller.activate(array![5.0].view()).unwrap();
        assert_abs_diff_eq!(output[0], 1.0 / 3.0, epsilon = 1e-12);
        assert_abs_diff_eq!(output[1], 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_discrete_single_risky_asset() {
        let mut controller = DiscreteController::new(2, 2).unwrap();
        assert_eq!(controller.num_parameters(), 3);

        controller.set_parameters(array![1.0, 0.0, 0.0].view()).unwrap();
        assert_eq!(controller.activate(array![0.5, 3.0].view()).unwrap(), array![0.0, 1.0]);
        assert_eq!(controller.activate(array![-0.5, 3.0].view()).unwrap(), array![2.0, -1.0]);
        assert_eq!(controller.activate(array![0.0, 3.0].view()).unwrap(), array![1.0, 0.0]);
    }

    #[test]
    fn test_discrete_multiple_risky_assets() {
        let mut controller = DiscreteController::new(1, 3).unwrap();
        controller
            .set_parameters(array![1.0, 0.0, 0.0, 1.0].view())
            .unwrap();
        let output = controller.activate(array![2.0].view()).unwrap();
        assert_eq!(output, array![-1.0, 1.0, 1.0]);
        assert_abs_diff_eq!(output.sum(), 1.0);
    }

    #[test]
    fn test_dimension_checks() {
        let mut controller = build_controller(ControllerKind::Softmax, 3, 2).unwrap();
        assert!(controller.set_parameters(array![1.0].view()).is_err());
        assert!(controller.activate(array![1.0].view()).is_err());
        assert!(DiscreteController::new(3, 1).is_err());
    }

    #[test]
    fn test_discrete_rejects_nan() {
        let mut controller = DiscreteController::new(1, 2).unwrap();
        controller.set_parameters(array![f64::NAN, 0.0].view()).unwrap();
        assert!(matches!(
            controller.activate(array![1.0].view()),
            Err(TradelabError::Numerical(_))
        ));
    }
}
