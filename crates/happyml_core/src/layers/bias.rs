//! Additive bias layer (spec §4.E): `y = x + b`; backward passes the
//! gradient upstream unchanged and hands the optimizer the column-summed
//! gradient (summed over rows, the batch/row axis) keyed as `label + "_b"`.

use super::{requantize, Bits, Layer};
use crate::error::{HappyMlError, Result};
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

pub struct Bias {
    label: String,
    bias: Tensor,
    bits: Bits,
}

impl Bias {
    pub fn new(label: impl Into<String>, out_features: usize, bits: Bits) -> Self {
        let shape = Shape::new(1, out_features, 1);
        let values = vec![0.0f32; out_features];
        let bias = match bits {
            Bits::Full32 => Tensor::full32(shape, values),
            Bits::Half16 => Tensor::half16(shape, &values),
            Bits::Quarter8 => Tensor::quarter8_auto_bias(shape, &values),
        };
        Self {
            label: label.into(),
            bias,
            bits,
        }
    }

    pub fn with_bias(label: impl Into<String>, bias: Tensor, bits: Bits) -> Self {
        Self {
            label: label.into(),
            bias,
            bits,
        }
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }
}

impl Layer for Bias {
    fn label(&self) -> &str {
        &self.label
    }

    fn input_shapes(&self) -> Vec<Shape> {
        vec![Shape::new(1, self.bias.columns(), 1)]
    }

    fn output_shape(&self) -> Shape {
        Shape::new(1, self.bias.columns(), 1)
    }

    fn forward(&mut self, inputs: &[Tensor], _for_training: bool) -> Result<Tensor> {
        let x = inputs
            .first()
            .ok_or_else(|| HappyMlError::Configuration("Bias expects one input".into()))?;
        Ok(x.add(&self.bias)?.materialize())
    }

    fn backward(&mut self, output_error: &Tensor, optimizer: &mut dyn Optimizer, learning_rate: f32) -> Result<Vec<Tensor>> {
        let shape = output_error.shape();
        let mut column_sum = vec![0.0f32; shape.columns * shape.channels];
        for ch in 0..shape.channels {
            for c in 0..shape.columns {
                let mut sum = 0.0f32;
                for r in 0..shape.rows {
                    sum += output_error.get_value(r, c, ch);
                }
                column_sum[ch * shape.columns + c] = sum;
            }
        }
        let db = Tensor::full32(Shape::new(1, shape.columns, shape.channels), column_sum);
        optimizer.step(&format!("{}_b", self.label), &self.bias, &db, learning_rate)?;
        self.bias = requantize(&self.bias, self.bits);
        Ok(vec![output_error.clone()])
    }

    fn parameters(&self) -> Vec<(String, Tensor)> {
        vec![(format!("{}_b", self.label), self.bias.clone())]
    }

    fn load_parameters(&mut self, params: &std::collections::HashMap<String, Tensor>) -> Result<()> {
        if let Some(t) = params.get(&format!("{}_b", self.label)) {
            self.bias = requantize(t, self.bits);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Sgd;

    #[test]
    fn forward_adds_bias() {
        let mut bias = Bias::with_bias(
            "b",
            Tensor::full32(Shape::new(1, 2, 1), vec![1.0, -1.0]),
            Bits::Full32,
        );
        let x = Tensor::full32(Shape::new(1, 2, 1), vec![1.0, 1.0]);
        let y = bias.forward(&[x], false).unwrap();
        assert_eq!(y.get_value(0, 0, 0), 2.0);
        assert_eq!(y.get_value(0, 1, 0), 0.0);
    }

    #[test]
    fn backward_sums_rows_into_bias_gradient() {
        let mut bias = Bias::with_bias("b", Tensor::filled(Shape::new(1, 2, 1), 0.0), Bits::Full32);
        bias.forward(&[Tensor::filled(Shape::new(2, 2, 1), 0.0)], true).unwrap();
        let dE = Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 2.0, 3.0, 4.0]);
        let mut opt = Sgd;
        let grads = bias.backward(&dE, &mut opt, 1.0).unwrap();
        assert_eq!(grads[0].shape(), dE.shape());
        // column sums are (4, 6); after an SGD step of lr=1 bias moves by -(4,6).
        assert!((bias.bias().get_value(0, 0, 0) - (-4.0)).abs() < 1e-6);
        assert!((bias.bias().get_value(0, 1, 0) - (-6.0)).abs() < 1e-6);
    }
}
