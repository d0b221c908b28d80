use super::Optimizer;
use crate::error::Result;
use crate::tensor::Tensor;
use std::collections::HashMap;

struct AdamState {
    m: Tensor,
    v: Tensor,
    t: i32,
}

/// `m <- b1*m + (1-b1)*G; v <- b2*v + (1-b2)*G^2; P <- P - lr*m_hat/(sqrt(v_hat)+eps)`
/// (defaults `b1=0.9, b2=0.999, eps=1e-8`).
pub struct Adam {
    pub beta1: f32,
    pub beta2: f32,
    pub eps: f32,
    state: HashMap<String, AdamState>,
}

impl Adam {
    pub fn new(beta1: f32, beta2: f32, eps: f32) -> Self {
        Self {
            beta1,
            beta2,
            eps,
            state: HashMap::new(),
        }
    }
}

impl Default for Adam {
    fn default() -> Self {
        Self::new(0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn step(&mut self, label: &str, param: &Tensor, grad: &Tensor, learning_rate: f32) -> Result<()> {
        let entry = self.state.entry(label.to_string()).or_insert_with(|| AdamState {
            m: Tensor::filled(grad.shape(), 0.0),
            v: Tensor::filled(grad.shape(), 0.0),
            t: 0,
        });

        entry.t += 1;
        let m_new = entry
            .m
            .scale(self.beta1)
            .add(&grad.scale(1.0 - self.beta1))?
            .materialize();
        let v_new = entry
            .v
            .scale(self.beta2)
            .add(&grad.power(2.0).scale(1.0 - self.beta2))?
            .materialize();

        let bias_correction1 = 1.0 - self.beta1.powi(entry.t);
        let bias_correction2 = 1.0 - self.beta2.powi(entry.t);
        let m_hat = m_new.scale(1.0 / bias_correction1);
        let v_hat = v_new.scale(1.0 / bias_correction2);

        let denom_recip = v_hat.power(0.5).add_scalar(self.eps).power(-1.0);
        let step = m_hat.multiply(&denom_recip)?.scale(learning_rate);
        let updated = param.subtract(&step)?;
        param.assign(&updated)?;

        entry.m = m_new;
        entry.v = v_new;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Shape;

    #[test]
    fn adam_moves_param_toward_negative_gradient() {
        let mut opt = Adam::default();
        let param = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        let grad = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        opt.step("w", &param, &grad, 0.01).unwrap();
        assert!(param.get_value(0, 0, 0) < 1.0);
    }

    #[test]
    fn adam_state_is_independent_per_label() {
        let mut opt = Adam::default();
        let a = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        let b = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        let grad = Tensor::full32(Shape::new(1, 1, 1), vec![1.0]);
        opt.step("a", &a, &grad, 0.01).unwrap();
        opt.step("a", &a, &grad, 0.01).unwrap();
        opt.step("b", &b, &grad, 0.01).unwrap();
        assert!(a.get_value(0, 0, 0) < b.get_value(0, 0, 0));
    }
}
