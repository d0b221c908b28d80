//! Loss functions (spec §4.H): per-prediction error, batch-aggregated loss,
//! and the gradient handed to the output node's backward pass. Dispatched by
//! [`crate::config::LossKind`] rather than a trait object, matching the
//! tagged-union dispatch the tensor engine itself uses (spec §9).

use crate::config::LossKind;
use crate::error::Result;
use crate::tensor::Tensor;
use std::rc::Rc;

impl LossKind {
    /// Elementwise error contribution of one prediction against its label.
    pub fn calc_err(&self, expected: &Tensor, predicted: &Tensor) -> Result<Tensor> {
        match self {
            LossKind::MeanSquaredError => {
                let diff = predicted.subtract(expected)?;
                Ok(diff.multiply(&diff)?.materialize())
            }
            LossKind::CategoricalCrossEntropy => {
                let clamped = predicted.value_transform(Rc::new(|p: f32| p.max(1e-7)));
                Ok(expected.multiply(&clamped.log())?.scale(-1.0).materialize())
            }
            LossKind::BinaryCrossEntropy => {
                let clamped = predicted.value_transform(Rc::new(|p: f32| p.clamp(1e-7, 1.0 - 1e-7)));
                let term1 = expected.multiply(&clamped.log())?;
                let one_minus_expected = expected.scale(-1.0).add_scalar(1.0);
                let one_minus_predicted = clamped.scale(-1.0).add_scalar(1.0);
                let term2 = one_minus_expected.multiply(&one_minus_predicted.log())?;
                Ok(term1.add(&term2)?.scale(-1.0).materialize())
            }
        }
    }

    /// Mean per-cell error across the batch (`total_error` is the elementwise
    /// sum of `calc_err` over every sample in the batch).
    pub fn batch_loss(&self, total_error: &Tensor, batch_size: usize) -> f32 {
        let cells = total_error.shape().cell_count().max(1);
        total_error.sum() / (cells as f32 * batch_size.max(1) as f32)
    }

    /// Gradient of the batch loss with respect to one sample's prediction,
    /// pre-averaged over `batch_size` (spec §4.H: "averages over B").
    pub fn derivative(&self, expected: &Tensor, predicted: &Tensor, batch_size: usize) -> Result<Tensor> {
        let scale = 1.0 / batch_size.max(1) as f32;
        match self {
            LossKind::MeanSquaredError => Ok(predicted.subtract(expected)?.scale(2.0 * scale).materialize()),
            // Softmax's backward is the identity (spec §9 "Softmax/cross-entropy
            // coupling"), so the combined derivative collapses to prediction
            // minus truth: this loss must sit directly after a Softmax
            // activation for the shortcut to be valid.
            LossKind::CategoricalCrossEntropy => Ok(predicted.subtract(expected)?.scale(scale).materialize()),
            LossKind::BinaryCrossEntropy => {
                let clamped = predicted.value_transform(Rc::new(|p: f32| p.clamp(1e-7, 1.0 - 1e-7)));
                let numerator = clamped.subtract(expected)?;
                let denom = clamped.multiply(&clamped.scale(-1.0).add_scalar(1.0))?;
                let reciprocal_denom = denom.value_transform(Rc::new(|d: f32| 1.0 / d.max(1e-7)));
                Ok(numerator.multiply(&reciprocal_denom)?.scale(scale).materialize())
            }
        }
    }
}
