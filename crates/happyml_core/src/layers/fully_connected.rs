use super::{requantize, Bits, Layer};
use crate::error::{HappyMlError, Result};
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

/// `y = x . W`; backward computes `dx = dE . W^T`, `dW = x^T . dE`, keyed
/// to the optimizer as `label + "_w"`.
pub struct FullyConnected {
    label: String,
    weight: Tensor,
    bits: Bits,
    cached_input: Option<Tensor>,
}

impl FullyConnected {
    pub fn new(label: impl Into<String>, in_features: usize, out_features: usize, bits: Bits) -> Self {
        let shape = Shape::new(in_features, out_features, 1);
        let values = vec![0.0f32; shape.cell_count()];
        let weight = match bits {
            Bits::Full32 => Tensor::full32(shape, values),
            Bits::Half16 => Tensor::half16(shape, &values),
            Bits::Quarter8 => Tensor::quarter8_auto_bias(shape, &values),
        };
        Self {
            label: label.into(),
            weight,
            bits,
            cached_input: None,
        }
    }

    pub fn with_weight(label: impl Into<String>, weight: Tensor, bits: Bits) -> Self {
        Self {
            label: label.into(),
            weight,
            bits,
            cached_input: None,
        }
    }

    pub fn weight(&self) -> &Tensor {
        &self.weight
    }

    pub fn in_features(&self) -> usize {
        self.weight.rows()
    }

    pub fn out_features(&self) -> usize {
        self.weight.columns()
    }
}

impl Layer for FullyConnected {
    fn label(&self) -> &str {
        &self.label
    }

    fn input_shapes(&self) -> Vec<Shape> {
        vec![Shape::new(1, self.in_features(), 1)]
    }

    fn output_shape(&self) -> Shape {
        Shape::new(1, self.out_features(), 1)
    }

    fn forward(&mut self, inputs: &[Tensor], _for_training: bool) -> Result<Tensor> {
        let x = inputs
            .first()
            .ok_or_else(|| HappyMlError::Configuration("FullyConnected expects one input".into()))?;
        self.cached_input = Some(x.clone());
        Ok(x.matmul(&self.weight)?.materialize())
    }

    fn backward(&mut self, output_error: &Tensor, optimizer: &mut dyn Optimizer, learning_rate: f32) -> Result<Vec<Tensor>> {
        let x = self
            .cached_input
            .clone()
            .ok_or_else(|| HappyMlError::Configuration("backward called before forward".into()))?;
        let dx = output_error.matmul(&self.weight.transpose())?.materialize();
        let dw = x.transpose().matmul(output_error)?.materialize();
        optimizer.step(&format!("{}_w", self.label), &self.weight, &dw, learning_rate)?;
        self.weight = requantize(&self.weight, self.bits);
        Ok(vec![dx])
    }

    fn parameters(&self) -> Vec<(String, Tensor)> {
        vec![(format!("{}_w", self.label), self.weight.clone())]
    }

    fn load_parameters(&mut self, params: &std::collections::HashMap<String, Tensor>) -> Result<()> {
        if let Some(t) = params.get(&format!("{}_w", self.label)) {
            self.weight = requantize(t, self.bits);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optim::Sgd;

    #[test]
    fn forward_computes_matmul() {
        let mut fc = FullyConnected::with_weight(
            "fc",
            Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 0.0, 0.0, 1.0]),
            Bits::Full32,
        );
        let x = Tensor::full32(Shape::new(1, 2, 1), vec![3.0, 4.0]);
        let y = fc.forward(&[x], false).unwrap();
        assert_eq!(y.get_value(0, 0, 0), 3.0);
        assert_eq!(y.get_value(0, 1, 0), 4.0);
    }

    #[test]
    fn backward_updates_weight_and_returns_input_grad() {
        let mut fc = FullyConnected::with_weight(
            "fc",
            Tensor::full32(Shape::new(2, 2, 1), vec![1.0, 0.0, 0.0, 1.0]),
            Bits::Full32,
        );
        let x = Tensor::full32(Shape::new(1, 2, 1), vec![1.0, 1.0]);
        fc.forward(&[x], true).unwrap();
        let dE = Tensor::full32(Shape::new(1, 2, 1), vec![1.0, 1.0]);
        let mut opt = Sgd;
        let grads = fc.backward(&dE, &mut opt, 0.1).unwrap();
        assert_eq!(grads.len(), 1);
        assert_eq!(grads[0].shape(), Shape::new(1, 2, 1));
        // Weight should have moved away from identity.
        assert_ne!(fc.weight().get_value(0, 0, 0), 1.0);
    }
}
