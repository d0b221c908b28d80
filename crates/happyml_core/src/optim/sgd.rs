use super::Optimizer;
use crate::error::Result;
use crate::tensor::Tensor;

/// `P <- P - learning_rate * G`. No per-label state.
#[derive(Debug, Default)]
pub struct Sgd;

impl Optimizer for Sgd {
    fn step(&mut self, _label: &str, param: &Tensor, grad: &Tensor, learning_rate: f32) -> Result<()> {
        let updated = param.subtract(&grad.scale(learning_rate))?;
        param.assign(&updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    #[test]
    fn step_moves_param_against_gradient() {
        let mut opt = Sgd;
        let param = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        let grad = Tensor::full32(Shape::new(1, 1, 1), vec![0.5]);
        opt.step("w", &param, &grad, 0.1).unwrap();
        assert!((param.get_value(0, 0, 0) - 0.95).abs() < 1e-6);
    }
}
