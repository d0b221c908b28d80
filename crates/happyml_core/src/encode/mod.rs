//! String-to-tensor encoders and tensor-to-string decoders (spec §4.D).

pub mod decoders;
pub mod encoders;

pub use decoders::{Decoded, Decoder, Tensor_};
pub use encoders::{LabelEncoder, PixelEncoder, ScalarEncoder, TokenEncoder};
