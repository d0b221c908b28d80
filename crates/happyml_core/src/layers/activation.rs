//! Elementwise activation layer (spec §4.E). Forward applies the chosen
//! nonlinearity cell-by-cell; backward multiplies the upstream gradient by
//! the activation's derivative evaluated at the cached input, except
//! `Softmax`, whose backward is the identity — valid only when the layer
//! is followed immediately by categorical cross-entropy loss (spec §4.E,
//! §9 "Softmax/cross-entropy coupling").

use super::Layer;
use crate::error::{HappyMlError, Result};
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ActivationKind {
    Tanh,
    /// `x / (1 + |x|)`, a branchless fast approximation of `tanh` (no
    /// `exp`/`tanh` call); deliberately coarser near saturation, documented
    /// per the same policy as the `Half16` float codec approximation.
    TanhApprox,
    Relu,
    LeakyRelu { alpha: f32 },
    Sigmoid,
    /// `0.5 * (x / (1 + |x|)) + 0.5`, the fast-sigmoid approximation.
    SigmoidApprox,
    Softmax,
}

pub struct Activation {
    label: String,
    kind: ActivationKind,
    shape: Shape,
    cached_input: Option<Tensor>,
}

impl Activation {
    pub fn new(label: impl Into<String>, kind: ActivationKind, shape: Shape) -> Self {
        Self {
            label: label.into(),
            kind,
            shape,
            cached_input: None,
        }
    }

    fn forward_value(&self, x: f32) -> f32 {
        match self.kind {
            ActivationKind::Tanh => x.tanh(),
            ActivationKind::TanhApprox => x / (1.0 + x.abs()),
            ActivationKind::Relu => x.max(0.0),
            ActivationKind::LeakyRelu { alpha } => {
                if x < 0.0 {
                    alpha * x
                } else {
                    x
                }
            }
            ActivationKind::Sigmoid => 1.0 / (1.0 + (-x).exp()),
            ActivationKind::SigmoidApprox => 0.5 * (x / (1.0 + x.abs())) + 0.5,
            ActivationKind::Softmax => unreachable!("softmax forward is row-wise, handled separately"),
        }
    }

    fn derivative_value(&self, x: f32) -> f32 {
        match self.kind {
            ActivationKind::Tanh => {
                let t = x.tanh();
                1.0 - t * t
            }
            ActivationKind::TanhApprox => {
                let d = 1.0 + x.abs();
                1.0 / (d * d)
            }
            ActivationKind::Relu => {
                if x > 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            ActivationKind::LeakyRelu { alpha } => {
                if x > 0.0 {
                    1.0
                } else {
                    alpha
                }
            }
            ActivationKind::Sigmoid => {
                let s = 1.0 / (1.0 + (-x).exp());
                s * (1.0 - s)
            }
            ActivationKind::SigmoidApprox => {
                let d = 1.0 + x.abs();
                0.5 / (d * d)
            }
            ActivationKind::Softmax => 1.0,
        }
    }

    fn softmax_row(input: &Tensor, row: usize) -> Vec<f32> {
        let shape = input.shape();
        let largest = (0..shape.columns)
            .map(|c| input.get_value(row, c, 0))
            .fold(f32::NEG_INFINITY, f32::max);
        let exps: Vec<f32> = (0..shape.columns)
            .map(|c| (input.get_value(row, c, 0) - largest).exp())
            .collect();
        let sum: f32 = exps.iter().sum();
        exps.into_iter().map(|e| e / sum).collect()
    }
}

impl Layer for Activation {
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
            .ok_or_else(|| HappyMlError::Configuration("Activation expects one input".into()))?;
        self.cached_input = Some(x.clone());

        if self.kind == ActivationKind::Softmax {
            let shape = x.shape();
            if shape.rows != 1 {
                return Err(HappyMlError::ShapeMismatch(
                    "Softmax supports single-row input only".into(),
                ));
            }
            let row = Self::softmax_row(x, 0);
            return Ok(Tensor::full32(shape, row));
        }

        let dense = x.materialize();
        let shape = dense.shape();
        let values: Vec<f32> = (0..shape.cell_count())
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                self.forward_value(dense.get_value(r, c, ch))
            })
            .collect();
        Ok(Tensor::full32(shape, values))
    }

    fn backward(&mut self, output_error: &Tensor, _optimizer: &mut dyn Optimizer, _learning_rate: f32) -> Result<Vec<Tensor>> {
        if self.kind == ActivationKind::Softmax {
            // Valid only when immediately followed by categorical cross-entropy,
            // whose derivative already folds in the softmax Jacobian (spec §9).
            return Ok(vec![output_error.clone()]);
        }

        let x = self
            .cached_input
            .clone()
            .ok_or_else(|| HappyMlError::Configuration("backward called before forward".into()))?;
        let shape = x.shape();
        let derivative: Vec<f32> = (0..shape.cell_count())
            .map(|idx| {
                let (r, c, ch) = shape.decompose(idx);
                self.derivative_value(x.get_value(r, c, ch))
            })
            .collect();
        let dx = Tensor::full32(shape, derivative).multiply(output_error)?.materialize();
        Ok(vec![dx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_zeroes_negatives() {
        let mut act = Activation::new("a", ActivationKind::Relu, Shape::new(1, 3, 1));
        let x = Tensor::full32(Shape::new(1, 3, 1), vec![-1.0, 0.0, 2.0]);
        let y = act.forward(&[x], false).unwrap();
        assert_eq!(y.get_value(0, 0, 0), 0.0);
        assert_eq!(y.get_value(0, 2, 0), 2.0);
    }

    #[test]
    fn tanh_derivative_uses_cached_input() {
        let mut act = Activation::new("a", ActivationKind::Tanh, Shape::new(1, 1, 1));
        let x = Tensor::full32(Shape::new(1, 1, 1), vec![0.0]);
        act.forward(&[x], true).unwrap();
        let dE = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        let mut opt = crate::optim::Sgd;
        let grads = act.backward(&dE, &mut opt, 0.1).unwrap();
        // derivative of tanh at 0 is 1.
        assert!((grads[0].get_value(0, 0, 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn softmax_sums_to_one() {
        let mut act = Activation::new("a", ActivationKind::Softmax, Shape::new(1, 3, 1));
        let x = Tensor::full32(Shape::new(1, 3, 1), vec![1.0, 2.0, 3.0]);
        let y = act.forward(&[x], false).unwrap();
        let sum = y.get_value(0, 0, 0) + y.get_value(0, 1, 0) + y.get_value(0, 2, 0);
        assert!((sum - 1.0).abs() < 1e-5);
    }

    #[test]
    fn softmax_backward_is_identity() {
        let mut act = Activation::new("a", ActivationKind::Softmax, Shape::new(1, 2, 1));
        let x = Tensor::full32(Shape::new(1, 2, 1), vec![0.1, 0.2]);
        act.forward(&[x], true).unwrap();
        let dE = Tensor::full32(Shape::new(1, 2, 1), vec![0.3, -0.3]);
        let mut opt = crate::optim::Sgd;
        let grads = act.backward(&dE, &mut opt, 0.1).unwrap();
        assert_eq!(grads[0].get_value(0, 0, 0), 0.3);
        assert_eq!(grads[0].get_value(0, 1, 0), -0.3);
    }
}
