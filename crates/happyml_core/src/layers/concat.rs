//! Binary layer combining two equal-row-count inputs widthwise into
//! `(rows, colsA + colsB, channels)` (spec §4.E).

use super::Layer;
use crate::error::{HappyMlError, Result};
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

pub struct ConcatenateWide {
    label: String,
    left_shape: Shape,
    right_shape: Shape,
}

impl ConcatenateWide {
    pub fn new(label: impl Into<String>, left_shape: Shape, right_shape: Shape) -> Self {
        Self {
            label: label.into(),
            left_shape,
            right_shape,
        }
    }
}

impl Layer for ConcatenateWide {
    fn label(&self) -> &str {
        &self.label
    }

    fn input_shapes(&self) -> Vec<Shape> {
        vec![self.left_shape, self.right_shape]
    }

    fn output_shape(&self) -> Shape {
        Shape::new(
            self.left_shape.rows,
            self.left_shape.columns + self.right_shape.columns,
            self.left_shape.channels,
        )
    }

    fn forward(&mut self, inputs: &[Tensor], _for_training: bool) -> Result<Tensor> {
        if inputs.len() != 2 {
            return Err(HappyMlError::Configuration("ConcatenateWide expects two inputs".into()));
        }
        Ok(inputs[0].concat_wide(&inputs[1])?.materialize())
    }

    fn backward(&mut self, output_error: &Tensor, _optimizer: &mut dyn Optimizer, _learning_rate: f32) -> Result<Vec<Tensor>> {
        let left_cols = self.left_shape.columns;
        let shape = output_error.shape();
        let dx_left = output_error.window(0, shape.rows, 0, left_cols)?.materialize();
        let dx_right = output_error
            .window(0, shape.rows, left_cols, shape.columns - left_cols)?
            .materialize();
        Ok(vec![dx_left, dx_right])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Sgd;

    #[test]
    fn forward_concatenates_columns() {
        let mut layer = ConcatenateWide::new("cat", Shape::new(1, 2, 1), Shape::new(1, 3, 1));
        let a = Tensor::full32(Shape::new(1, 2, 1), vec![1.0, 2.0]);
        let b = Tensor::full32(Shape::new(1, 3, 1), vec![3.0, 4.0, 5.0]);
        let y = layer.forward(&[a, b], false).unwrap();
        assert_eq!(y.shape(), Shape::new(1, 5, 1));
        assert_eq!(y.get_value(0, 2, 0), 3.0);
    }

    #[test]
    fn backward_splits_gradient_back_to_each_input() {
        let mut layer = ConcatenateWide::new("cat", Shape::new(1, 2, 1), Shape::new(1, 3, 1));
        layer
            .forward(
                &[Tensor::filled(Shape::new(1, 2, 1), 0.0), Tensor::filled(Shape::new(1, 3, 1), 0.0)],
                true,
            )
            .unwrap();
        let dE = Tensor::full32(Shape::new(1, 5, 1), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let mut opt = Sgd;
        let grads = layer.backward(&dE, &mut opt, 0.1).unwrap();
        assert_eq!(grads[0].shape(), Shape::new(1, 2, 1));
        assert_eq!(grads[1].shape(), Shape::new(1, 3, 1));
        assert_eq!(grads[0].get_value(0, 1, 0), 2.0);
        assert_eq!(grads[1].get_value(0, 0, 0), 3.0);
    }
}
