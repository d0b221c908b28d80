//! View-only reshape to `(1, rows*columns*channels, 1)` (spec §4.E).

use super::Layer;
use crate::error::{HappyMlError, Result};
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

pub struct Flatten {
    label: String,
    input_shape: Shape,
}

impl Flatten {
    pub fn new(label: impl Into<String>, input_shape: Shape) -> Self {
        Self {
            label: label.into(),
            input_shape,
        }
    }
}

impl Layer for Flatten {
    fn label(&self) -> &str {
        &self.label
    }

    fn input_shapes(&self) -> Vec<Shape> {
        vec![self.input_shape]
    }

    fn output_shape(&self) -> Shape {
        Shape::new(1, self.input_shape.cell_count(), 1)
    }

    fn forward(&mut self, inputs: &[Tensor], _for_training: bool) -> Result<Tensor> {
        let x = inputs
            .first()
            .ok_or_else(|| HappyMlError::Configuration("Flatten expects one input".into()))?;
        Ok(x.flatten_all().materialize())
    }

    fn backward(&mut self, output_error: &Tensor, _optimizer: &mut dyn Optimizer, _learning_rate: f32) -> Result<Vec<Tensor>> {
        let dx = output_error.reshape(self.input_shape)?.materialize();
        Ok(vec![dx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flatten_reshapes_to_single_row() {
        let mut flatten = Flatten::new("f", Shape::new(2, 2, 1));
        let x = Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]);
        let y = flatten.forward(&[x], false).unwrap();
        assert_eq!(y.shape(), Shape::new(1, 4, 1));
    }

    #[test]
    fn backward_restores_input_shape() {
        let mut flatten = Flatten::new("f", Shape::new(2, 2, 1));
        flatten
            .forward(&[Tensor::filled(Shape::new(2, 2, 1), 0.0)], true)
            .unwrap();
        let dE = Tensor::full32(Shape::new(1, 4, 1), vec![1.0, 2.0, 3.0, 4.0]);
        let mut opt = crate::optim::Sgd;
        let grads = flatten.backward(&dE, &mut opt, 0.1).unwrap();
        assert_eq!(grads[0].shape(), Shape::new(2, 2, 1));
        assert_eq!(grads[0].get_value(1, 1, 0), 4.0);
    }
}
