use super::Optimizer;
use crate::error::Result;
use crate::tensor::Tensor;
use std::collections::HashMap;

/// `v <- mu*v + G; P <- P - learning_rate*v` (default `mu = 0.9`).
pub struct SgdMomentum {
    pub mu: f32,
    velocity: HashMap<String, Tensor>,
}

impl SgdMomentum {
    pub fn new(mu: f32) -> Self {
        Self {
            mu,
            velocity: HashMap::new(),
        }
    }
}

impl Default for SgdMomentum {
    fn default() -> Self {
        Self::new(0.9)
    }
}

impl Optimizer for SgdMomentum {
    fn step(&mut self, label: &str, param: &Tensor, grad: &Tensor, learning_rate: f32) -> Result<()> {
        let v_old = self
            .velocity
            .get(label)
            .cloned()
            .unwrap_or_else(|| Tensor::filled(grad.shape(), 0.0));
        let v_new = v_old.scale(self.mu).add(grad)?.materialize();
        let updated = param.subtract(&v_new.scale(learning_rate))?;
        param.assign(&updated)?;
        self.velocity.insert(label.to_string(), v_new);
        Ok(())
    }
}
