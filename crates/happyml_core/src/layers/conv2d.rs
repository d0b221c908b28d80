//! 2D "valid" (unpadded) convolution layer (spec §4.E): filters
//! `F: (k, k, filters)`, forward `ValidCrossCorrelation2d(input, F) + bias`;
//! backward computes the input gradient via `FullConvolve2d(dE, rot180(F))`
//! summed per filter, and the filter gradient via
//! `ValidCrossCorrelation2d(input, dE)`.
//!
//! Square filters (and, for the filter-gradient pass, a square error map)
//! are required — inherited from [`crate::tensor::Tensor::valid_cross_correlation_2d`]'s
//! square-kernel invariant; rectangular inputs are fine as long as the
//! resulting `(rows-k+1, cols-k+1)` error map is square (true whenever the
//! input is square, the only shape this layer is exercised with in spec's
//! end-to-end scenarios).

use super::{requantize, Bits, Layer};
use crate::error::{HappyMlError, Result};
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

pub struct Convolution2dValid {
    label: String,
    input_shape: Shape,
    filters: Tensor,
    bias: Tensor,
    bits: Bits,
    cached_input: Option<Tensor>,
}

impl Convolution2dValid {
    pub fn new(label: impl Into<String>, input_shape: Shape, kernel_size: usize, num_filters: usize, bits: Bits) -> Self {
        let filter_shape = Shape::new(kernel_size, kernel_size, num_filters);
        let bias_shape = Shape::new(1, 1, num_filters);
        let filters = Tensor::full32(filter_shape, vec![0.0; filter_shape.cell_count()]);
        let bias = Tensor::full32(bias_shape, vec![0.0; num_filters]);
        Self {
            label: label.into(),
            input_shape,
            filters,
            bias,
            bits,
            cached_input: None,
        }
    }

    pub fn with_filters(label: impl Into<String>, input_shape: Shape, filters: Tensor, bias: Tensor, bits: Bits) -> Self {
        Self {
            label: label.into(),
            input_shape,
            filters,
            bias,
            bits,
            cached_input: None,
        }
    }

    pub fn filters(&self) -> &Tensor {
        &self.filters
    }

    pub fn bias(&self) -> &Tensor {
        &self.bias
    }

    pub fn num_filters(&self) -> usize {
        self.filters.channels()
    }

    pub fn kernel_size(&self) -> usize {
        self.filters.rows()
    }
}

impl Layer for Convolution2dValid {
    fn label(&self) -> &str {
        &self.label
    }

    fn input_shapes(&self) -> Vec<Shape> {
        vec![self.input_shape]
    }

    fn output_shape(&self) -> Shape {
        crate::tensor::views::valid_cross_correlation_output_shape(self.input_shape, self.filters.shape())
            .expect("Convolution2dValid constructed with a kernel larger than its declared input")
    }

    fn forward(&mut self, inputs: &[Tensor], _for_training: bool) -> Result<Tensor> {
        let x = inputs
            .first()
            .ok_or_else(|| HappyMlError::Configuration("Convolution2dValid expects one input".into()))?;
        self.cached_input = Some(x.clone());
        let conv = x.valid_cross_correlation_2d(&self.filters)?;
        Ok(conv.add(&self.bias)?.materialize())
    }

    fn backward(&mut self, output_error: &Tensor, optimizer: &mut dyn Optimizer, learning_rate: f32) -> Result<Vec<Tensor>> {
        let x = self
            .cached_input
            .clone()
            .ok_or_else(|| HappyMlError::Configuration("backward called before forward".into()))?;
        let num_filters = self.num_filters();

        let dw = x.valid_cross_correlation_2d(output_error)?.materialize();
        optimizer.step(&format!("{}_w", self.label), &self.filters, &dw, learning_rate)?;

        let oe_shape = output_error.shape();
        let mut db_values = vec![0.0f32; num_filters];
        for (f, slot) in db_values.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            for r in 0..oe_shape.rows {
                for c in 0..oe_shape.columns {
                    sum += output_error.get_value(r, c, f);
                }
            }
            *slot = sum;
        }
        let db = Tensor::full32(Shape::new(1, 1, num_filters), db_values);
        optimizer.step(&format!("{}_b", self.label), &self.bias, &db, learning_rate)?;

        let in_shape = x.shape();
        let mut dx = Tensor::filled(Shape::new(in_shape.rows, in_shape.columns, 1), 0.0);
        for f in 0..num_filters {
            let error_channel = output_error.channel_extract(f)?;
            let kernel_channel = self.filters.channel_extract(f)?.rotate180();
            let contribution = error_channel.convolve_2d(&kernel_channel);
            dx = dx.add(&contribution)?.materialize();
        }

        self.filters = requantize(&self.filters, self.bits);
        self.bias = requantize(&self.bias, self.bits);
        Ok(vec![dx])
    }

    fn parameters(&self) -> Vec<(String, Tensor)> {
        vec![
            (format!("{}_w", self.label), self.filters.clone()),
            (format!("{}_b", self.label), self.bias.clone()),
        ]
    }

    fn load_parameters(&mut self, params: &std::collections::HashMap<String, Tensor>) -> Result<()> {
        if let Some(t) = params.get(&format!("{}_w", self.label)) {
            self.filters = requantize(t, self.bits);
        }
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
    fn forward_shape_matches_spec_scenario_5() {
        let mut conv = Convolution2dValid::new("c1", Shape::new(10, 10, 1), 3, 1, Bits::Full32);
        let input = Tensor::uniform(Shape::new(10, 10, 1), 1.0);
        let out = conv.forward(&[input], false).unwrap();
        assert_eq!(out.shape(), Shape::new(8, 8, 1));
    }

    #[test]
    fn backward_returns_input_shaped_gradient() {
        let mut conv = Convolution2dValid::new("c1", Shape::new(5, 5, 1), 3, 2, Bits::Full32);
        let input = Tensor::full32(Shape::new(5, 5, 1), vec![1.0; 25]);
        conv.forward(&[input], true).unwrap();
        let dE = Tensor::full32(Shape::new(3, 3, 2), vec![1.0; 18]);
        let mut opt = Sgd;
        let grads = conv.backward(&dE, &mut opt, 0.01).unwrap();
        assert_eq!(grads[0].shape(), Shape::new(5, 5, 1));
    }
}
