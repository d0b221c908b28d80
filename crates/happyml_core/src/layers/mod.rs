//! The layer library (spec §4.E). Layers are plain structs implementing
//! [`Layer`] with owned `Tensor` parameters (no `candle_nn::VarBuilder`
//! style external store); each keeps a small `label: String` field used to
//! key optimizer state, the same role `crate::kernels::packing::PackedTensor`
//! plays for parameter-role-keyed state in the teacher engine.

pub mod activation;
pub mod bias;
pub mod concat;
pub mod conv2d;
pub mod flatten;
pub mod fully_connected;
pub mod normalization;

pub use activation::{Activation, ActivationKind};
pub use bias::Bias;
pub use concat::ConcatenateWide;
pub use conv2d::Convolution2dValid;
pub use flatten::Flatten;
pub use fully_connected::FullyConnected;
pub use normalization::Normalization;

use crate::error::Result;
use crate::optim::Optimizer;
use crate::tensor::{Shape, Tensor};

/// Declared storage precision for a layer's parameters (spec §4.E).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bits {
    Full32,
    Half16,
    Quarter8,
}

pub trait Layer {
    fn label(&self) -> &str;
    fn input_shapes(&self) -> Vec<Shape>;
    fn output_shape(&self) -> Shape;

    fn forward(&mut self, inputs: &[Tensor], for_training: bool) -> Result<Tensor>;

    /// Given the gradient of the loss with respect to this layer's output,
    /// update any owned parameters via `optimizer` and return the gradient
    /// with respect to each input, in input order.
    fn backward(&mut self, output_error: &Tensor, optimizer: &mut dyn Optimizer, learning_rate: f32) -> Result<Vec<Tensor>>;

    /// Labeled view of this layer's owned parameter tensors, for model
    /// save/load (spec §4.H). Parameter-free layers (activation, flatten,
    /// concat) keep the default empty impl.
    fn parameters(&self) -> Vec<(String, Tensor)> {
        Vec::new()
    }

    /// Restore parameter tensors previously returned by [`Layer::parameters`]
    /// keyed by the same labels. Unknown keys are ignored; missing keys
    /// leave the layer's current (freshly constructed) value in place.
    fn load_parameters(&mut self, _params: &std::collections::HashMap<String, Tensor>) -> Result<()> {
        Ok(())
    }
}

/// Re-encode a parameter tensor into its declared precision after an
/// update. For `Quarter8` the covering exponent bias is recomputed from
/// the updated value range (spec §4.A); `Full32`/`Half16` params are
/// updated in place by `Tensor::assign` and need no replacement.
pub fn requantize(param: &Tensor, bits: Bits) -> Tensor {
    match bits {
        Bits::Full32 | Bits::Half16 => param.clone(),
        Bits::Quarter8 => {
            let values = param.to_vec();
            Tensor::quarter8_auto_bias(param.shape(), &values)
        }
    }
}
