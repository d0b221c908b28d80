//! HappyML numeric engine.
//!
//! The lazy tensor algebra ([`tensor`]), the binary columnar dataset format
//! ([`dataset`]), string/tensor encoders and decoders ([`encode`]), the
//! layer library and network graph ([`layers`], [`graph`]), optimizers
//! ([`optim`]), and the training loop ([`train`]). The command DSL and
//! file-format plumbing that drive this engine live in the `happyml_cli`
//! crate.

pub mod config;
pub mod dataset;
pub mod encode;
pub mod error;
pub mod floatcodec;
pub mod graph;
pub mod layers;
pub mod optim;
pub mod tensor;
pub mod train;

pub use error::{HappyMlError, Result};
pub use tensor::{Shape, Tensor};
