//! Optimizers (spec §4.F). `Optimizer` is a trait object
//! (`Box<dyn Optimizer>`) selected from the `configuration.happyml`
//! `optimizer:` line, the same way `bit_llama::train` picks an update
//! rule from a CLI flag — except the per-parameter state table here is an
//! ordinary `HashMap<String, _>` (no `Arc<Mutex<_>>`): the optimizer is
//! driven only from the single training thread (spec §5).

pub mod adam;
pub mod momentum;
pub mod sgd;

pub use adam::Adam;
pub use momentum::SgdMomentum;
pub use sgd::Sgd;

use crate::error::Result;
use crate::tensor::Tensor;

pub trait Optimizer {
    /// Update `param` in place given its gradient `grad`, keyed by the
    /// owning layer's stable parameter label (e.g. `"fc1_w"`).
    fn step(&mut self, label: &str, param: &Tensor, grad: &Tensor, learning_rate: f32) -> Result<()>;
}
