//! Normalization layer (spec §4.E): standardizes its input by the mean and
//! standard deviation of that same input (a per-sample, layer-norm-style
//! pass — this engine forwards one sample at a time, so "the running
//! mean/std_dev of the layer input" is recomputed fresh on every forward
//! rather than tracked as an exponential moving average across steps).
//!
//! Backward uses the standard batch-norm derivative shape, treating the
//! tensor's own cells as the normalization group:
//! `dE/σ − mean(dE/σ) − (x−μ)·mean(dE·(x−μ))/σ²`.

use super::Layer;
use crate::error::{HappyMlError, Result};
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

pub struct Normalization {
    label: String,
    shape: Shape,
    cached_input: Option<Tensor>,
    cached_mean: f32,
    cached_std_dev: f32,
}

impl Normalization {
    pub fn new(label: impl Into<String>, shape: Shape) -> Self {
        Self {
            label: label.into(),
            shape,
            cached_input: None,
            cached_mean: 0.0,
            cached_std_dev: 1.0,
        }
    }
}

impl Layer for Normalization {
    fn label(&self) -> &str {
        &self.label
    }

    fn input_shapes(&self) -> Vec<Shape> {
        vec![self.shape]
    }

    fn output_shape(&self) -> Shape {
        self.shape
    }

    fn forward(&mut self, inputs: &[Tensor], _for_training: bool) -> Result<Tensor> {
        let x = inputs
            .first()
            .ok_or_else(|| HappyMlError::Configuration("Normalization expects one input".into()))?;
        let dense = x.materialize();
        self.cached_mean = dense.mean();
        self.cached_std_dev = dense.std_dev().max(1e-8);
        self.cached_input = Some(dense.clone());
        Ok(dense.standardize(self.cached_mean, self.cached_std_dev).materialize())
    }

    fn backward(&mut self, output_error: &Tensor, _optimizer: &mut dyn Optimizer, _learning_rate: f32) -> Result<Vec<Tensor>> {
        let x = self
            .cached_input
            .clone()
            .ok_or_else(|| HappyMlError::Configuration("backward called before forward".into()))?;
        let std_dev = self.cached_std_dev;
        let mean = self.cached_mean;

        let dE_over_sigma = output_error.scale(1.0 / std_dev);
        let mean_dE_over_sigma = dE_over_sigma.mean();

        let x_minus_mean = x.subtract_scalar(mean);
        let dE_times_xmm = output_error.multiply(&x_minus_mean)?;
        let mean_dE_xmm = dE_times_xmm.mean();

        let term3 = x_minus_mean.scale(mean_dE_xmm / (std_dev * std_dev));
        let dx = dE_over_sigma
            .subtract_scalar(mean_dE_over_sigma)
            .subtract(&term3)?
            .materialize();
        Ok(vec![dx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Sgd;

    #[test]
    fn forward_standardizes_to_zero_mean() {
        let mut norm = Normalization::new("n", Shape::new(1, 4, 1));
        let x = Tensor::full32(Shape::new(1, 4, 1), vec![1.0, 2.0, 3.0, 4.0]);
        let y = norm.forward(&[x], true).unwrap();
        assert!(y.mean().abs() < 1e-5);
    }

    #[test]
    fn backward_runs_and_matches_input_shape() {
        let mut norm = Normalization::new("n", Shape::new(1, 4, 1));
        let x = Tensor::full32(Shape::new(1, 4, 1), vec![1.0, 2.0, 3.0, 4.0]);
        norm.forward(&[x], true).unwrap();
        let dE = Tensor::full32(Shape::new(1, 4, 1), vec![0.1, -0.1, 0.2, -0.2]);
        let mut opt = Sgd;
        let grads = norm.backward(&dE, &mut opt, 0.1).unwrap();
        assert_eq!(grads[0].shape(), Shape::new(1, 4, 1));
    }
}
